//! Follow, unfollow and the subscription feed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::{
    application::pagination::{POSTS_PER_PAGE, PageRequest},
    presentation::views::{
        AuthorLink, FollowContext, FollowTemplate, LayoutContext, ListingContext, profile_href,
        render_template_response,
    },
};

use super::{HttpState, Viewer, follow_error_response, public::PageQuery};

/// Subscribe to an author. Repeats and self-follows are silent no-ops.
pub(super) async fn follow(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(&viewer, &username).await {
        Ok(outcome) => {
            debug!(target = "yatube::http::follows", author = %username, outcome = ?outcome, "follow requested");
            Redirect::to(&profile_href(&username)).into_response()
        }
        Err(err) => follow_error_response(err, Some(&viewer)),
    }
}

pub(super) async fn unfollow(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(&viewer, &username).await {
        Ok(outcome) => {
            debug!(target = "yatube::http::follows", author = %username, outcome = ?outcome, "unfollow requested");
            Redirect::to(&profile_href(&username)).into_response()
        }
        Err(err) => follow_error_response(err, Some(&viewer)),
    }
}

pub(super) async fn feed(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = PageRequest::from_query(query.page.as_deref(), POSTS_PER_PAGE);
    let page = match state.follows.feed(viewer.id, request).await {
        Ok(page) => page,
        Err(err) => return follow_error_response(err, Some(&viewer)),
    };
    let following = match state.follows.following(viewer.id).await {
        Ok(following) => following,
        Err(err) => return follow_error_response(err, Some(&viewer)),
    };

    let content = FollowContext {
        listing: ListingContext::build("Authors you follow", &page, "/follow/", Some(&viewer)),
        following: following.iter().map(AuthorLink::from).collect(),
    };
    let view = LayoutContext::new("Subscriptions", Some(&viewer), content);
    render_template_response(FollowTemplate { view }, StatusCode::OK)
}
