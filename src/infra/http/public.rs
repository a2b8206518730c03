use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        accounts::AccountService,
        error::HttpError,
        follows::FollowService,
        pagination::{POSTS_PER_PAGE, PageRequest},
        posts::PostService,
    },
    cache::{PageCache, page_cache_layer},
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        FollowButton, GroupTemplate, IndexTemplate, LayoutContext, ListingContext,
        PostDetailContext, PostDetailTemplate, ProfileContext, ProfileTemplate, group_href,
        profile_href, render_not_found_response, render_template_response,
    },
};

use super::{
    MaybeViewer, SessionCookie, auth, follow_error_response,
    middleware::{log_responses, set_request_context},
    parse_post_id, post_error_response, posts, resolve_viewer, social,
};

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub media: Arc<UploadStorage>,
    pub cache: PageCache,
    pub session_cookie: SessionCookie,
    /// Upper bound for request bodies, image uploads included.
    pub body_limit: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the index is cached. The viewer is resolved in an outer layer so
    // cache keys can tell users apart.
    let cached_routes = Router::new()
        .route("/", get(index))
        .layer(middleware::from_fn_with_state(
            state.cache.clone(),
            page_cache_layer,
        ));

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", get(social::follow).post(social::follow))
        .route(
            "/profile/{username}/unfollow/",
            get(social::unfollow).post(social::unfollow),
        )
        .route("/follow/", get(social::feed))
        .route("/posts/{id}/", get(post_detail))
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .route("/posts/{id}/comment/", post(posts::add_comment))
        .route("/create/", get(posts::create_form).post(posts::create_submit))
        .route(
            "/auth/signup/",
            get(auth::signup_form).post(auth::signup_submit),
        )
        .route("/auth/login/", get(auth::login_form).post(auth::login_submit))
        .route("/auth/logout/", post(auth::logout))
        .route("/media/{*path}", get(serve_media));

    let body_limit = state.body_limit;
    cached_routes
        .merge(routes)
        .fallback(fallback)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state, resolve_viewer))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    pub(super) page: Option<String>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::from_query(self.page.as_deref(), POSTS_PER_PAGE)
    }
}

async fn index(
    State(state): State<HttpState>,
    viewer: MaybeViewer,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.posts.index(query.request()).await {
        Ok(page) => {
            let content = ListingContext::build("Latest posts", &page, "/", viewer.user());
            let view = LayoutContext::new("Yatube", viewer.user(), content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => post_error_response(err, viewer.user()),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: MaybeViewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.posts.group_posts(&slug, query.request()).await {
        Ok(listing) => {
            let group = &listing.group;
            let content = ListingContext::build(
                group.title.clone(),
                &listing.posts,
                &group_href(&group.slug),
                viewer.user(),
            )
            .with_description(group.description.clone());
            let view = LayoutContext::new(
                format!("Group posts {}", group.title),
                viewer.user(),
                content,
            );
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => post_error_response(err, viewer.user()),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: MaybeViewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let listing = match state.posts.author_posts(&username, query.request()).await {
        Ok(listing) => listing,
        Err(err) => return post_error_response(err, viewer.user()),
    };
    let author = &listing.author;

    let follower_count = match state.follows.follower_count(author.id).await {
        Ok(count) => count,
        Err(err) => return follow_error_response(err, viewer.user()),
    };

    let follow_button = match viewer.user() {
        Some(user) if user.id != author.id => {
            let following = match state.follows.is_following(Some(user.id), author.id).await {
                Ok(following) => following,
                Err(err) => return follow_error_response(err, viewer.user()),
            };
            let base = profile_href(&author.username);
            Some(FollowButton {
                following,
                follow_href: format!("{base}follow/"),
                unfollow_href: format!("{base}unfollow/"),
            })
        }
        _ => None,
    };

    let content = ProfileContext {
        username: author.username.clone(),
        post_count: listing.posts.total,
        follower_count,
        follow_button,
        listing: ListingContext::build(
            format!("All posts by {}", author.username),
            &listing.posts,
            &profile_href(&author.username),
            viewer.user(),
        ),
    };
    let view = LayoutContext::new(
        format!("Profile of {}", author.username),
        viewer.user(),
        content,
    );
    render_template_response(ProfileTemplate { view }, StatusCode::OK)
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: MaybeViewer,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(viewer.user());
    };

    match state.posts.post_detail(id).await {
        Ok(detail) => {
            let content = PostDetailContext::build(
                &detail.post,
                &detail.comments,
                detail.author_post_count,
                viewer.user(),
            );
            let view = LayoutContext::new(
                PostDetailContext::title(&detail.post),
                viewer.user(),
                content,
            );
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => post_error_response(err, viewer.user()),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath | UploadStorageError::NotAFile) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = "yatube::http::media",
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read file",
                &err,
            )
            .into_response()
        }
    }
}

async fn fallback(viewer: MaybeViewer) -> Response {
    render_not_found_response(viewer.user())
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    // Stored names carry a random component, so a path never changes content.
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
