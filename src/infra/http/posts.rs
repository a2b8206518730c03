//! Authoring: create, edit and comment.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartError};

use crate::{
    application::{
        error::HttpError,
        posts::{PostError, PostService},
    },
    domain::{
        entities::{GroupRecord, UserSummary},
        error::DomainError,
        types::PostId,
    },
    presentation::views::{
        LayoutContext, PostFormContext, PostFormErrors, PostFormTemplate, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{
    HttpState, Viewer,
    forms::{CommentForm, read_post_form},
    parse_post_id, post_error_response,
};

const SOURCE: &str = "infra::http::posts";

pub(super) async fn create_form(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
) -> Response {
    let groups = match state.posts.groups().await {
        Ok(groups) => groups,
        Err(err) => return post_error_response(err, Some(&viewer)),
    };
    let view = LayoutContext::new("New post", Some(&viewer), PostFormContext::create(&groups));
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    mut multipart: Multipart,
) -> Response {
    let input = match read_post_form(&mut multipart).await {
        Ok(input) => input,
        Err(err) => return multipart_error_response(err),
    };
    let text = input.text.clone();
    let group_id = input.group_id();

    let result = match input.into_command() {
        Ok(command) => state.posts.create_post(&viewer, command).await,
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(_) => Redirect::to(&profile_href(&viewer.username)).into_response(),
        Err(PostError::Validation(err)) => {
            let form = |groups: &[GroupRecord]| {
                PostFormContext::create(groups).with_submission(
                    text,
                    group_id,
                    groups,
                    field_errors(&err),
                )
            };
            render_form(&state.posts, &viewer, "New post", form).await
        }
        Err(err) => post_error_response(err, Some(&viewer)),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(Some(&viewer));
    };

    let post = match state.posts.editable_post(&viewer, id).await {
        Ok(post) => post,
        Err(PostError::NotAuthor(id)) => return detail_redirect(id),
        Err(err) => return post_error_response(err, Some(&viewer)),
    };

    render_form(&state.posts, &viewer, "Edit post", |groups| {
        PostFormContext::edit(&post, groups)
    })
    .await
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(raw_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(Some(&viewer));
    };

    // Authorship is checked before the body is read.
    let post = match state.posts.editable_post(&viewer, id).await {
        Ok(post) => post,
        Err(PostError::NotAuthor(id)) => return detail_redirect(id),
        Err(err) => return post_error_response(err, Some(&viewer)),
    };

    let input = match read_post_form(&mut multipart).await {
        Ok(input) => input,
        Err(err) => return multipart_error_response(err),
    };
    let text = input.text.clone();
    let group_id = input.group_id();

    let result = match input.into_command() {
        Ok(command) => state.posts.update_post(&viewer, id, command).await,
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(_) => detail_redirect(id),
        Err(PostError::NotAuthor(id)) => detail_redirect(id),
        Err(PostError::Validation(err)) => {
            let form = |groups: &[GroupRecord]| {
                PostFormContext::edit(&post, groups).with_submission(
                    text,
                    group_id,
                    groups,
                    field_errors(&err),
                )
            };
            render_form(&state.posts, &viewer, "Edit post", form).await
        }
        Err(err) => post_error_response(err, Some(&viewer)),
    }
}

/// Add a comment. Empty text creates nothing; the client always lands back
/// on the post.
pub(super) async fn add_comment(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(Some(&viewer));
    };

    match state.posts.add_comment(&viewer, id, &form.text).await {
        Ok(_) | Err(PostError::Validation(_)) => detail_redirect(id),
        Err(err) => post_error_response(err, Some(&viewer)),
    }
}

async fn render_form<F>(
    posts: &PostService,
    viewer: &UserSummary,
    title: &str,
    build: F,
) -> Response
where
    F: FnOnce(&[GroupRecord]) -> PostFormContext,
{
    match posts.groups().await {
        Ok(groups) => {
            let view = LayoutContext::new(title, Some(viewer), build(&groups));
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => post_error_response(err, Some(viewer)),
    }
}

fn field_errors(err: &DomainError) -> PostFormErrors {
    let message = Some(err.message());
    let mut errors = PostFormErrors::default();
    match err.field() {
        Some("text") => errors.text = message,
        Some("group") => errors.group = message,
        Some("image") => errors.image = message,
        _ => errors.form = message,
    }
    errors
}

fn detail_redirect(id: PostId) -> Response {
    Redirect::to(&format!("/posts/{id}/")).into_response()
}

fn multipart_error_response(err: MultipartError) -> Response {
    let status = err.status();
    let public_message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "Upload is too large"
    } else {
        "Invalid form data"
    };
    HttpError::from_error(SOURCE, status, public_message, &err).into_response()
}
