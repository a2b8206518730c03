//! Account signup, password login and cookie sessions.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{PasswordHash, SaltString},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::task;
use tracing::{debug, info};

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::{UserRecord, UserSummary};
use crate::domain::error::DomainError;
use crate::domain::users::{normalize_username, validate_password};

const TOKEN_TAG: &str = "ys";
const PREFIX_BYTES: usize = 6;
const SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error("username or password is incorrect")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionAuthError {
    #[error("malformed session token")]
    Malformed,
    #[error("unknown session")]
    Unknown,
    #[error("expired session")]
    Expired,
    #[error("session lookup failed")]
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct SignupCommand {
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub username: String,
    pub password: String,
}

/// A freshly issued session. `token` is only ever shown to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserSummary,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub async fn signup(&self, command: SignupCommand) -> Result<IssuedSession, AccountError> {
        let username = normalize_username(&command.username)?;
        validate_password(&command.password, &command.password_confirmation)?;

        if self.users.find_by_username(&username).await?.is_some() {
            return Err(AccountError::UsernameTaken(username));
        }

        let password_hash = hash_password(command.password).await?;
        let user = match self
            .users
            .create_user(CreateUserParams {
                username: username.clone(),
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => return Err(AccountError::UsernameTaken(username)),
            Err(err) => return Err(err.into()),
        };

        info!(target = "yatube::accounts", user_id = %user.id, username = %user.username, "user signed up");
        self.start_session(&user).await
    }

    pub async fn login(&self, command: LoginCommand) -> Result<IssuedSession, AccountError> {
        let user = self
            .users
            .find_by_username(command.username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(command.password, user.password_hash.clone()).await? {
            debug!(target = "yatube::accounts", username = %user.username, "password mismatch");
            return Err(AccountError::InvalidCredentials);
        }

        self.start_session(&user).await
    }

    pub async fn start_session(&self, user: &UserRecord) -> Result<IssuedSession, AccountError> {
        let prefix = hex::encode(rand::random::<[u8; PREFIX_BYTES]>());
        let secret = hex::encode(rand::random::<[u8; SECRET_BYTES]>());
        let token = format!("{TOKEN_TAG}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix,
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        Ok(IssuedSession {
            user: user.summary(),
            token,
            expires_at,
        })
    }

    /// Resolve a session cookie to the user it belongs to.
    pub async fn authenticate(&self, token: &str) -> Result<UserSummary, SessionAuthError> {
        let parsed = parse_token(token).ok_or(SessionAuthError::Malformed)?;
        let session = self
            .sessions
            .find_by_prefix(parsed.prefix)
            .await
            .map_err(|_| SessionAuthError::Unavailable)?
            .ok_or(SessionAuthError::Unknown)?;

        if session.expires_at <= OffsetDateTime::now_utc() {
            return Err(SessionAuthError::Expired);
        }

        let hashed_input = hash_secret(parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(SessionAuthError::Unknown);
        }

        let user = self
            .users
            .find_user(session.user_id)
            .await
            .map_err(|_| SessionAuthError::Unavailable)?
            .ok_or(SessionAuthError::Unknown)?;
        Ok(user.summary())
    }

    /// End the session named by `token`. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(());
        };
        if let Some(session) = self.sessions.find_by_prefix(parsed.prefix).await? {
            self.sessions.delete_session(session.id).await?;
        }
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AccountError> {
        let removed = self
            .sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await?;
        Ok(removed)
    }
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_password(password: String) -> Result<String, AccountError> {
    task::spawn_blocking(move || hash_password_sync(&password))
        .await
        .map_err(|err| AccountError::Hashing(err.to_string()))?
}

async fn verify_password(password: String, stored: String) -> Result<bool, AccountError> {
    task::spawn_blocking(move || verify_password_sync(&password, &stored))
        .await
        .map_err(|err| AccountError::Hashing(err.to_string()))
}

fn hash_password_sync(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|err| AccountError::Hashing(err.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hashing(err.to_string()))
}

fn verify_password_sync(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

struct ParsedToken<'a> {
    prefix: &'a str,
    secret: &'a str,
}

fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_TAG {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.len() != PREFIX_BYTES * 2 || secret.len() != SECRET_BYTES * 2 {
        return None;
    }
    Some(ParsedToken { prefix, secret })
}
