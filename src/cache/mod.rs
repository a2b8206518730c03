//! Page cache.
//!
//! A coarse, time-boxed cache of rendered responses. Only routes that opt in
//! through [`page_cache_layer`] are cached; entries live for a fixed TTL
//! (20 seconds unless configured otherwise) and are dropped early only by an
//! explicit [`PageCache::clear`].
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! max_entries = 256
//! ```

mod config;
mod lock;
mod middleware;
mod store;

pub use config::{DEFAULT_MAX_ENTRIES, DEFAULT_PAGE_TTL, PageCacheConfig};
pub use middleware::page_cache_layer;
pub(crate) use store::{
    METRIC_PAGE_CACHE_EVICT, METRIC_PAGE_CACHE_EXPIRED, METRIC_PAGE_CACHE_HIT,
    METRIC_PAGE_CACHE_MISS,
};
pub use store::{CacheStoreError, CachedPage, PageCache, should_store_response};
