mod auth;
mod forms;
mod middleware;
mod posts;
mod public;
mod social;

pub use auth::{MaybeViewer, SessionCookie, Viewer, resolve_viewer};
pub use public::{HttpState, build_router};

use axum::response::{IntoResponse, Redirect, Response};

use crate::{
    application::{error::HttpError, follows::FollowError, posts::PostError},
    domain::{entities::UserSummary, types::PostId},
    presentation::views::render_not_found_response,
};

/// Parse a post id from a path segment; anything non-numeric is simply absent.
fn parse_post_id(raw: &str) -> Option<PostId> {
    raw.parse::<PostId>().ok().filter(|id| id.get() > 0)
}

/// Only same-site absolute paths are accepted as redirect targets.
fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let is_local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    is_local.then(|| next.to_string())
}

fn login_redirect(next: &str) -> Redirect {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Redirect::to(&format!("/auth/login/?next={encoded}"))
}

/// Lookups that miss render the HTML 404 page; everything else goes through `HttpError`.
fn post_error_response(err: PostError, viewer: Option<&UserSummary>) -> Response {
    match err {
        PostError::PostNotFound | PostError::GroupNotFound(_) | PostError::AuthorNotFound(_) => {
            not_found_with_report(HttpError::from(err), viewer)
        }
        other => HttpError::from(other).into_response(),
    }
}

fn follow_error_response(err: FollowError, viewer: Option<&UserSummary>) -> Response {
    match err {
        FollowError::AuthorNotFound(_) => not_found_with_report(HttpError::from(err), viewer),
        other => HttpError::from(other).into_response(),
    }
}

fn not_found_with_report(error: HttpError, viewer: Option<&UserSummary>) -> Response {
    let mut response = render_not_found_response(viewer);
    error.into_report().attach(&mut response);
    response
}
