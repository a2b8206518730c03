use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::Paginated;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserSummary};
use crate::domain::posts::title_preview;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] = format_description!("[day] [month repr:short] [year]");
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(viewer: Option<&UserSummary>) -> Response {
    let view = LayoutContext::new("Page not found", viewer, ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn post_href(post: &PostRecord) -> String {
    format!("/posts/{}/", post.id)
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn media_href(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

fn display_date(value: OffsetDateTime) -> String {
    value.format(DISPLAY_DATE).unwrap_or_default()
}

fn iso_date(value: OffsetDateTime) -> String {
    value.format(ISO_DATE).unwrap_or_default()
}

#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
    pub profile_href: String,
}

impl From<&UserSummary> for ViewerView {
    fn from(user: &UserSummary) -> Self {
        Self {
            username: user.username.clone(),
            profile_href: profile_href(&user.username),
        }
    }
}

/// Page shell shared by every template: document title and the signed-in user.
#[derive(Clone)]
pub struct LayoutContext<T> {
    pub title: String,
    pub viewer: Option<ViewerView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(title: impl Into<String>, viewer: Option<&UserSummary>, content: T) -> Self {
        Self {
            title: title.into(),
            viewer: viewer.map(ViewerView::from),
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub href: String,
    pub edit_href: Option<String>,
    pub text: String,
    pub author: String,
    pub author_href: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
    pub published: String,
    pub iso_date: String,
}

impl PostCard {
    pub fn build(post: &PostRecord, viewer: Option<&UserSummary>) -> Self {
        let can_edit = viewer.is_some_and(|viewer| post.is_authored_by(viewer.id));
        Self {
            id: post.id.get(),
            href: post_href(post),
            edit_href: can_edit.then(|| format!("/posts/{}/edit/", post.id)),
            text: post.text.clone(),
            author: post.author.username.clone(),
            author_href: profile_href(&post.author.username),
            group: post.group.as_ref().map(|group| GroupBadge {
                title: group.title.clone(),
                href: group_href(&group.slug),
            }),
            image_url: post.image.as_deref().map(media_href),
            published: display_date(post.created_at),
            iso_date: iso_date(post.created_at),
        }
    }
}

#[derive(Clone)]
pub struct PageLink {
    pub number: u32,
    pub href: String,
    pub is_current: bool,
}

/// Numbered page navigation under a listing.
#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub pages: Vec<PageLink>,
}

impl PaginatorView {
    pub fn build<T>(page: &Paginated<T>, base_path: &str) -> Self {
        let href = |number: u32| format!("{base_path}?page={number}");
        Self {
            number: page.number,
            num_pages: page.num_pages,
            previous_href: page
                .has_previous()
                .then(|| href(page.previous_number())),
            next_href: page.has_next().then(|| href(page.next_number())),
            pages: (1..=page.num_pages)
                .map(|number| PageLink {
                    number,
                    href: href(number),
                    is_current: number == page.number,
                })
                .collect(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.num_pages > 1
    }
}

pub struct ListingContext {
    pub heading: String,
    pub description: Option<String>,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl ListingContext {
    pub fn build(
        heading: impl Into<String>,
        page: &Paginated<PostRecord>,
        base_path: &str,
        viewer: Option<&UserSummary>,
    ) -> Self {
        Self {
            heading: heading.into(),
            description: None,
            posts: page
                .items
                .iter()
                .map(|post| PostCard::build(post, viewer))
                .collect(),
            paginator: PaginatorView::build(page, base_path),
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            description: (!description.trim().is_empty()).then_some(description),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingContext>,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<ListingContext>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowContext>,
}

pub struct FollowContext {
    pub listing: ListingContext,
    pub following: Vec<AuthorLink>,
}

#[derive(Clone)]
pub struct AuthorLink {
    pub username: String,
    pub href: String,
}

impl From<&UserSummary> for AuthorLink {
    fn from(user: &UserSummary) -> Self {
        Self {
            username: user.username.clone(),
            href: profile_href(&user.username),
        }
    }
}

pub struct FollowButton {
    pub following: bool,
    pub follow_href: String,
    pub unfollow_href: String,
}

pub struct ProfileContext {
    pub username: String,
    pub post_count: u64,
    pub follower_count: u64,
    /// `None` for anonymous viewers and on one's own profile.
    pub follow_button: Option<FollowButton>,
    pub listing: ListingContext,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

#[derive(Clone)]
pub struct CommentView {
    pub author: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author: comment.author.username.clone(),
            author_href: profile_href(&comment.author.username),
            text: comment.text.clone(),
            published: display_date(comment.created_at),
        }
    }
}

pub struct PostDetailContext {
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    /// Form target when the viewer may comment.
    pub comment_action: Option<String>,
}

impl PostDetailContext {
    pub fn build(
        post: &PostRecord,
        comments: &[CommentRecord],
        author_post_count: u64,
        viewer: Option<&UserSummary>,
    ) -> Self {
        Self {
            post: PostCard::build(post, viewer),
            author_post_count,
            comments: comments.iter().map(CommentView::from).collect(),
            comment_action: viewer.map(|_| format!("/posts/{}/comment/", post.id)),
        }
    }

    pub fn title(post: &PostRecord) -> String {
        format!("Post {}", title_preview(&post.text))
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

#[derive(Clone, Default)]
pub struct PostFormErrors {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<String>,
    pub form: Option<String>,
}

pub struct PostFormContext {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: PostFormErrors,
}

impl PostFormContext {
    pub fn create(groups: &[GroupRecord]) -> Self {
        Self {
            is_edit: false,
            action: "/create/".to_string(),
            text: String::new(),
            groups: group_options(groups, None),
            current_image: None,
            errors: PostFormErrors::default(),
        }
    }

    pub fn edit(post: &PostRecord, groups: &[GroupRecord]) -> Self {
        Self {
            is_edit: true,
            action: format!("/posts/{}/edit/", post.id),
            text: post.text.clone(),
            groups: group_options(groups, post.group.as_ref().map(|group| group.id.get())),
            current_image: post.image.as_deref().map(media_href),
            errors: PostFormErrors::default(),
        }
    }

    /// Re-populate the form with what the user submitted.
    pub fn with_submission(
        self,
        text: String,
        group_id: Option<i64>,
        groups: &[GroupRecord],
        errors: PostFormErrors,
    ) -> Self {
        Self {
            text,
            groups: group_options(groups, group_id),
            errors,
            ..self
        }
    }
}

fn group_options(groups: &[GroupRecord], selected: Option<i64>) -> Vec<GroupOption> {
    groups
        .iter()
        .map(|group| GroupOption {
            id: group.id.get(),
            title: group.title.clone(),
            selected: Some(group.id.get()) == selected,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

#[derive(Default)]
pub struct LoginContext {
    pub username: String,
    pub next: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

#[derive(Default)]
pub struct SignupContext {
    pub username: String,
    pub username_error: Option<String>,
    pub password_error: Option<String>,
    pub password_confirmation_error: Option<String>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to the latest posts".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
