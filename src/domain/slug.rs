//! Group slug derivation and validation.

use slug::slugify;
use thiserror::Error;

pub const MAX_SLUG_CHARS: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("`{slug}` is not a valid slug; expected lowercase letters, digits and hyphens")]
    Malformed { slug: String },
    #[error("slug exceeds {MAX_SLUG_CHARS} characters")]
    TooLong,
}

/// Derive a slug from human-readable text, e.g. a group title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    check_length(candidate)
}

/// Accept an explicit slug only if it is already in canonical form.
pub fn validate_slug(slug: &str) -> Result<String, SlugError> {
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slugify(slug) != slug {
        return Err(SlugError::Malformed {
            slug: slug.to_string(),
        });
    }
    check_length(slug.to_string())
}

fn check_length(slug: String) -> Result<String, SlugError> {
    if slug.chars().count() > MAX_SLUG_CHARS {
        return Err(SlugError::TooLong);
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_from_title() {
        assert_eq!(derive_slug("Lev Tolstoy Fans").unwrap(), "lev-tolstoy-fans");
    }

    #[test]
    fn empty_title_is_rejected() {
        assert_eq!(derive_slug("  "), Err(SlugError::EmptyInput));
        assert!(matches!(
            derive_slug("!!!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn explicit_slug_must_be_canonical() {
        assert_eq!(validate_slug("cats-2").unwrap(), "cats-2");
        assert!(matches!(
            validate_slug("Cats Club"),
            Err(SlugError::Malformed { .. })
        ));
    }
}
