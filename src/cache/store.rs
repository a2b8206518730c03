//! Time-boxed storage for rendered pages.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;

use super::config::PageCacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_PAGE_CACHE_HIT: &str = "yatube_page_cache_hit_total";
pub(crate) const METRIC_PAGE_CACHE_MISS: &str = "yatube_page_cache_miss_total";
pub(crate) const METRIC_PAGE_CACHE_EXPIRED: &str = "yatube_page_cache_expired_total";
pub(crate) const METRIC_PAGE_CACHE_EVICT: &str = "yatube_page_cache_evict_total";

/// A buffered response ready to be replayed.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

impl CachedPage {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers: headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            body,
        }
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        response
    }
}

struct Entry {
    page: CachedPage,
    stored_at: Instant,
}

/// Page cache with a fixed time-to-live and LRU capacity.
///
/// Entries are never invalidated by writes elsewhere in the application; a
/// page is served until its TTL lapses or [`PageCache::clear`] is called.
#[derive(Clone)]
pub struct PageCache {
    config: PageCacheConfig,
    entries: Arc<Mutex<LruCache<String, Entry>>>,
}

impl PageCache {
    pub fn new(config: PageCacheConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(LruCache::new(config.max_entries))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Fresh entry for `key`, if any. Expired entries are dropped on the way.
    pub fn get(&self, key: &str) -> Option<CachedPage> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = entries
            .peek(key)
            .map(|entry| entry.stored_at.elapsed() >= self.config.ttl);

        let fresh = match expired {
            Some(false) => entries.get(key).map(|entry| entry.page.clone()),
            Some(true) => {
                entries.pop(key);
                counter!(METRIC_PAGE_CACHE_EXPIRED).increment(1);
                None
            }
            None => None,
        };

        if fresh.is_some() {
            counter!(METRIC_PAGE_CACHE_HIT).increment(1);
        } else {
            counter!(METRIC_PAGE_CACHE_MISS).increment(1);
        }
        fresh
    }

    pub fn set(&self, key: impl Into<String>, page: CachedPage) {
        let key = key.into();
        let entry = Entry {
            page,
            stored_at: Instant::now(),
        };
        let evicted = mutex_lock(&self.entries, SOURCE, "set").push(key.clone(), entry);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!(METRIC_PAGE_CACHE_EVICT).increment(1);
        }
    }

    /// Drop every cached page.
    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer `response`, store it under `key`, and hand back an equivalent response.
    pub async fn store_response(
        &self,
        key: String,
        response: Response,
    ) -> Result<Response, (Response, CacheStoreError)> {
        let (rebuilt, page) = buffer_response(response).await?;
        self.set(key, page);
        Ok(rebuilt)
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

/// Only plain successful pages are cacheable; anything that sets a cookie is
/// specific to one client.
pub fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}

async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedPage), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let page = CachedPage::new(parts.status, &parts.headers, bytes.clone());
            Ok((Response::from_parts(parts, Body::from(bytes)), page))
        }
        Err(error) => Err((
            Response::from_parts(parts, Body::empty()),
            CacheStoreError::Buffer(error.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, time::Duration};

    use super::*;

    fn page(body: &'static str) -> CachedPage {
        CachedPage::new(StatusCode::OK, &HeaderMap::new(), Bytes::from_static(body.as_bytes()))
    }

    fn cache(ttl_secs: u64, max_entries: usize) -> PageCache {
        PageCache::new(PageCacheConfig {
            enabled: true,
            ttl: Duration::from_secs(ttl_secs),
            max_entries: NonZeroUsize::new(max_entries).expect("non-zero"),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = cache(20, 8);
        cache.set("/", page("first"));

        tokio::time::advance(Duration::from_secs(19)).await;
        assert_eq!(cache.get("/").expect("still fresh").body, "first");

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("/").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let cache = cache(20, 8);
        cache.set("/", page("a"));
        cache.set("/?page=2", page("b"));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.get("/").is_none());
        assert!(cache.get("/?page=2").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_least_recent() {
        let cache = cache(20, 2);
        cache.set("a", page("a"));
        cache.set("b", page("b"));
        cache.get("a");
        cache.set("c", page("c"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn cookies_and_errors_are_not_stored() {
        let ok = Response::new(Body::empty());
        assert!(should_store_response(&ok));

        let mut with_cookie = Response::new(Body::empty());
        with_cookie
            .headers_mut()
            .insert(header::SET_COOKIE, HeaderValue::from_static("a=b"));
        assert!(!should_store_response(&with_cookie));

        let mut missing = Response::new(Body::empty());
        *missing.status_mut() = StatusCode::NOT_FOUND;
        assert!(!should_store_response(&missing));
    }
}
