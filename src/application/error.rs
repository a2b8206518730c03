use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        accounts::AccountError, admin::AdminError, follows::FollowError, posts::PostError,
    },
    config::LoadError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl HttpError {
    /// Diagnostic half of the error, for responses rendered elsewhere.
    pub fn into_report(self) -> ErrorReport {
        self.report
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "application::posts::PostError";
        match error {
            PostError::PostNotFound | PostError::GroupNotFound(_) | PostError::AuthorNotFound(_) => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            PostError::Validation(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            PostError::NotAuthor(_) => {
                HttpError::from_error(SOURCE, StatusCode::FORBIDDEN, "Forbidden", &error)
            }
            PostError::Media(_) | PostError::Repo(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        const SOURCE: &str = "application::follows::FollowError";
        let status = match error {
            FollowError::AuthorNotFound(_) => StatusCode::NOT_FOUND,
            FollowError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let public_message = if status == StatusCode::NOT_FOUND {
            "Not found"
        } else {
            "Internal server error"
        };
        HttpError::from_error(SOURCE, status, public_message, &error)
    }
}

impl From<AccountError> for HttpError {
    fn from(error: AccountError) -> Self {
        const SOURCE: &str = "application::accounts::AccountError";
        match error {
            AccountError::Validation(_)
            | AccountError::UsernameTaken(_)
            | AccountError::InvalidCredentials => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            AccountError::Hashing(_) | AccountError::Repo(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
        }
    }
}

/// Top-level failure of a CLI command or of server startup.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Process exit status, following the BSD `sysexits` conventions.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Infra(InfraError::Configuration { .. }) => 78,
            AppError::Admin(AdminError::NotFound { .. }) => 66,
            AppError::Validation(_)
            | AppError::Admin(
                AdminError::ConstraintViolation(_)
                | AdminError::Slug(_)
                | AdminError::SlugTaken(_),
            ) => 65,
            AppError::Infra(InfraError::Database { .. })
            | AppError::Admin(AdminError::Repo(_))
            | AppError::Account(AccountError::Repo(_)) => 69,
            AppError::Infra(InfraError::Io(_) | InfraError::Server { .. }) => 74,
            AppError::Infra(InfraError::Telemetry(_)) | AppError::Account(_) => 70,
        }
    }
}
