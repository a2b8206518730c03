//! Session cookies, viewer extraction and the signup/login/logout forms.

use std::convert::Infallible;

use axum::{
    Form,
    body::Body,
    extract::{FromRequestParts, Query, State},
    http::{Request, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    application::{
        accounts::{AccountError, IssuedSession, LoginCommand, SessionAuthError, SignupCommand},
        error::HttpError,
    },
    domain::entities::UserSummary,
    presentation::views::{
        LayoutContext, LoginContext, LoginTemplate, SignupContext, SignupTemplate,
        render_template_response,
    },
};

use super::{HttpState, login_redirect, safe_next};

/// Resolve the session cookie into a `UserSummary` request extension.
///
/// Bad, unknown and expired tokens fall through as anonymous requests.
pub async fn resolve_viewer(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let mut viewer = None;
    if let Some(cookie) = jar.get(state.session_cookie.name()) {
        match state.accounts.authenticate(cookie.value()).await {
            Ok(user) => viewer = Some(user),
            Err(SessionAuthError::Unavailable) => {
                warn!(target = "yatube::http::auth", "session lookup failed; treating request as anonymous");
            }
            Err(reason) => {
                debug!(target = "yatube::http::auth", reason = %reason, "ignoring session cookie");
            }
        }
    }

    if let Some(user) = viewer.clone() {
        request.extensions_mut().insert(user);
    }
    let mut response = next.run(request).await;
    if let Some(user) = viewer {
        response.extensions_mut().insert(user);
    }
    response
}

/// The signed-in user. Anonymous requests are redirected to the login form.
#[derive(Debug, Clone)]
pub struct Viewer(pub UserSummary);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserSummary>()
            .cloned()
            .map(Viewer)
            .ok_or_else(|| {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|target| target.as_str())
                    .unwrap_or_else(|| parts.uri.path());
                login_redirect(next)
            })
    }
}

/// The signed-in user, if any.
#[derive(Debug, Clone, Default)]
pub struct MaybeViewer(pub Option<UserSummary>);

impl MaybeViewer {
    pub fn user(&self) -> Option<&UserSummary> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for MaybeViewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<UserSummary>().cloned()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    username: String,
    password: String,
    password_confirmation: String,
}

pub(super) async fn login_form(
    MaybeViewer(viewer): MaybeViewer,
    Query(query): Query<NextQuery>,
) -> Response {
    let content = LoginContext {
        next: safe_next(query.next.as_deref()),
        ..Default::default()
    };
    let view = LayoutContext::new("Log in", viewer.as_ref(), content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref());
    let command = LoginCommand {
        username: form.username.clone(),
        password: form.password,
    };

    match state.accounts.login(command).await {
        Ok(session) => {
            info!(target = "yatube::http::auth", username = %session.user.username, "user logged in");
            let jar = jar.add(state.session_cookie.issue(&session));
            (jar, Redirect::to(next.as_deref().unwrap_or("/"))).into_response()
        }
        Err(AccountError::InvalidCredentials) => {
            let content = LoginContext {
                username: form.username,
                next,
                error: Some(
                    "Please enter a correct username and password. Note that both fields may be case-sensitive."
                        .to_string(),
                ),
            };
            let view = LayoutContext::new("Log in", None, content);
            render_template_response(LoginTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn signup_form(MaybeViewer(viewer): MaybeViewer) -> Response {
    let view = LayoutContext::new("Sign up", viewer.as_ref(), SignupContext::default());
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let command = SignupCommand {
        username: form.username.clone(),
        password: form.password,
        password_confirmation: form.password_confirmation,
    };

    let mut content = SignupContext {
        username: form.username,
        ..Default::default()
    };
    match state.accounts.signup(command).await {
        Ok(session) => {
            let jar = jar.add(state.session_cookie.issue(&session));
            return (jar, Redirect::to("/")).into_response();
        }
        Err(AccountError::UsernameTaken(_)) => {
            content.username_error = Some("A user with that username already exists.".to_string());
        }
        Err(AccountError::Validation(err)) => {
            let message = Some(err.message());
            match err.field() {
                Some("username") => content.username_error = message,
                Some("password_confirmation") => content.password_confirmation_error = message,
                _ => content.password_error = message,
            }
        }
        Err(err) => return HttpError::from(err).into_response(),
    }

    let view = LayoutContext::new("Sign up", None, content);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(state.session_cookie.name())
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        warn!(target = "yatube::http::auth", error = %err, "failed to delete session");
    }
    let jar = jar.remove(state.session_cookie.removal());
    (jar, Redirect::to("/")).into_response()
}

/// Name and attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn issue(&self, session: &IssuedSession) -> Cookie<'static> {
        Cookie::build((self.name.clone(), session.token.clone()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .expires(session.expires_at)
            .build()
    }

    fn removal(&self) -> Cookie<'static> {
        Cookie::build(self.name.clone()).path("/").build()
    }
}
