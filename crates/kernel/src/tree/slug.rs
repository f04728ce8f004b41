//! Page slugs.

use crate::error::{CoreError, CoreResult};

/// Longest slug accepted by the tree.
pub const MAX_SLUG_LENGTH: usize = 255;

/// Longest slug produced by [`slugify`].
const SLUGIFY_LENGTH: usize = 128;

/// Check that a slug is URL-safe: 1..=255 lowercase ASCII letters, digits,
/// `-` or `_`.
pub fn validate_slug(slug: &str) -> CoreResult<()> {
    if slug.is_empty() {
        return Err(CoreError::invalid_slug(slug, "slug must not be empty"));
    }
    if slug.len() > MAX_SLUG_LENGTH {
        return Err(CoreError::invalid_slug(
            slug,
            format!("slug must be at most {MAX_SLUG_LENGTH} characters"),
        ));
    }
    if let Some(bad) = slug
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
    {
        return Err(CoreError::invalid_slug(
            slug,
            format!("character '{bad}' is not allowed"),
        ));
    }
    Ok(())
}

/// Convert a title into a slug.
///
/// Lowercases, replaces everything but ASCII letters and digits with
/// hyphens, collapses runs of hyphens and trims them from both ends. Long
/// results are cut at the last hyphen before 128 characters.
pub fn slugify(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_hyphen = true;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_was_hyphen = false;
        } else if !prev_was_hyphen {
            result.push('-');
            prev_was_hyphen = true;
        }
    }
    while result.ends_with('-') {
        result.pop();
    }

    if result.len() > SLUGIFY_LENGTH {
        // ASCII only, so any byte index is a char boundary.
        let truncated = &result[..SLUGIFY_LENGTH];
        return match truncated.rfind('-') {
            Some(last_hyphen) => truncated[..last_hyphen].to_string(),
            None => truncated.to_string(),
        };
    }
    result
}
