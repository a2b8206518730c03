//! Page cache middleware.
//!
//! Wraps the routes that opt into caching. Keys combine path, query and the
//! signed-in user so one visitor never sees a page rendered for another.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use crate::domain::entities::UserSummary;

use super::store::{PageCache, should_store_response};

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<PageCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.is_enabled() || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = cache_key(&request);
    if let Some(page) = cache.get(&key) {
        debug!(cache = "page", outcome = "hit", key = %key, "serving cached page");
        return page.into_response();
    }

    debug!(cache = "page", outcome = "miss", key = %key, "rendering page");
    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match cache.store_response(key, response).await {
        Ok(response) => response,
        Err((response, error)) => {
            warn!(cache = "page", error = %error, "failed to store page");
            response
        }
    }
}

fn cache_key(request: &Request<Body>) -> String {
    let uri = request.uri();
    let viewer = request
        .extensions()
        .get::<UserSummary>()
        .map(|user| user.id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    match uri.query() {
        Some(query) => format!("{viewer}:{}?{query}", uri.path()),
        None => format!("{viewer}:{}", uri.path()),
    }
}
