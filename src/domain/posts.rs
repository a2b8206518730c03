//! Text invariants for posts and comments.

use crate::domain::error::DomainError;

/// Posts render the first characters of their text as a page title.
pub const TITLE_PREVIEW_CHARS: usize = 30;

/// Upper bound on stored text, to keep a single row from swallowing the page.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Validate post text, returning it trimmed.
pub fn normalize_post_text(raw: &str) -> Result<String, DomainError> {
    normalize_text("text", raw)
}

/// Validate comment text, returning it trimmed.
pub fn normalize_comment_text(raw: &str) -> Result<String, DomainError> {
    normalize_text("text", raw)
}

fn normalize_text(field: &'static str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "This field is required."));
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(DomainError::validation(
            field,
            format!("Ensure this value has at most {MAX_TEXT_CHARS} characters."),
        ));
    }
    Ok(trimmed.to_string())
}

/// Short single-line preview of a post, used in page titles.
pub fn title_preview(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .take(TITLE_PREVIEW_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        let err = normalize_post_text("   \n\t").unwrap_err();
        assert_eq!(err.field(), Some("text"));
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(normalize_comment_text("  hello \n").unwrap(), "hello");
    }

    #[test]
    fn overlong_text_is_rejected() {
        let text = "a".repeat(MAX_TEXT_CHARS + 1);
        assert!(normalize_post_text(&text).is_err());
    }

    #[test]
    fn preview_is_capped() {
        let preview = title_preview(&"x".repeat(100));
        assert_eq!(preview.chars().count(), TITLE_PREVIEW_CHARS);
    }
}
