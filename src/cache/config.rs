use std::{num::NonZeroUsize, time::Duration};

/// Default lifetime of a cached page.
pub const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(20);

/// Default number of distinct pages kept before LRU eviction.
pub const DEFAULT_MAX_ENTRIES: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(value) => value,
    None => unreachable!(),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: NonZeroUsize,
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_PAGE_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}
