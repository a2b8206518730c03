use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

/// SQLSTATE `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

/// Translate driver errors into repository errors using the SQLSTATE class
/// rather than message text.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            match db.kind() {
                ErrorKind::UniqueViolation => RepoError::Duplicate { constraint },
                // A referenced user, post or group vanished between lookup and write.
                ErrorKind::ForeignKeyViolation => RepoError::InvalidInput {
                    message: format!("missing referenced row (`{constraint}`)"),
                },
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation => RepoError::Integrity {
                    message: db.message().to_string(),
                },
                _ if db.code().as_deref() == Some(QUERY_CANCELED) => RepoError::Timeout,
                _ => RepoError::from_persistence(db),
            }
        }
        other => RepoError::from_persistence(other),
    }
}
