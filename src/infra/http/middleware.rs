use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Level, debug, event};
use uuid::Uuid;

use crate::{application::error::ErrorReport, domain::entities::UserSummary};

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag the request with an id and echo it back as `x-request-id`.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().simple().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Log every response; failures carry the `ErrorReport` their handler attached.
///
/// Runs outside viewer resolution, so the viewer is read back from the
/// response extensions.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let viewer = response
        .extensions()
        .get::<UserSummary>()
        .map(|user| user.username.clone())
        .unwrap_or_default();

    let Some(level) = failure_level(status) else {
        debug!(
            target = "yatube::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms,
            request_id,
            viewer,
            "request served"
        );
        return response;
    };

    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    macro_rules! log_failure {
        ($level:expr, $message:literal) => {
            event!(
                target: "yatube::http::response",
                $level,
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms,
                source,
                detail = %detail,
                chain = ?messages,
                request_id,
                viewer,
                $message
            )
        };
    }

    match level {
        Level::ERROR => log_failure!(Level::ERROR, "request failed"),
        Level::WARN => log_failure!(Level::WARN, "client request error"),
        _ => log_failure!(Level::DEBUG, "resource not found"),
    }

    response
}

/// Missing pages are routine for a public site and stay at debug.
fn failure_level(status: StatusCode) -> Option<Level> {
    if status.is_server_error() {
        Some(Level::ERROR)
    } else if status == StatusCode::NOT_FOUND {
        Some(Level::DEBUG)
    } else if status.is_client_error() {
        Some(Level::WARN)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_levels_follow_status_class() {
        assert_eq!(failure_level(StatusCode::OK), None);
        assert_eq!(failure_level(StatusCode::SEE_OTHER), None);
        assert_eq!(failure_level(StatusCode::NOT_FOUND), Some(Level::DEBUG));
        assert_eq!(failure_level(StatusCode::PAYLOAD_TOO_LARGE), Some(Level::WARN));
        assert_eq!(failure_level(StatusCode::INTERNAL_SERVER_ERROR), Some(Level::ERROR));
    }
}
