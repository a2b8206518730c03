//! Username and password rules for account signup.

use crate::domain::error::DomainError;

pub const MAX_USERNAME_CHARS: usize = 150;
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Usernames may contain letters, digits and `@ . + - _`.
pub fn normalize_username(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("username", "This field is required."));
    }
    if trimmed.chars().count() > MAX_USERNAME_CHARS {
        return Err(DomainError::validation(
            "username",
            format!("Ensure this value has at most {MAX_USERNAME_CHARS} characters."),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(DomainError::validation(
            "password",
            format!("This password is too short. It must contain at least {MIN_PASSWORD_CHARS} characters."),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation(
            "password",
            "This password is entirely numeric.",
        ));
    }
    if password != confirmation {
        return Err(DomainError::validation(
            "password_confirmation",
            "The two password fields didn't match.",
        ));
    }
    Ok(())
}
