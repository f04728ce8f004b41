//! Checks for scalar primitive types that need more than a JSON type test.

use std::sync::LazyLock;

use ammonia::Builder;
use url::Url;

/// URL schemes accepted by `url` scalars.
const URL_SCHEMES: &[&str] = &["http", "https", "ftp", "ftps"];

/// Exactly one `@` with a non-empty local part and a dotted domain.
pub(crate) fn is_valid_email(s: &str) -> bool {
    let parts: Vec<&str> = s.splitn(3, '@').collect();
    if parts.len() != 2 {
        return false;
    }
    let local = parts[0];
    let domain = parts[1];
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !s.contains(char::is_whitespace)
}

/// An absolute URL with a host and one of the accepted schemes.
pub(crate) fn is_valid_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => {
            URL_SCHEMES.contains(&url.scheme()) && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Sanitizer applied to rich text before it is rendered.
static SANITIZER: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::default();
    builder.link_rel(None);
    builder
});

/// Same serialization as [`SANITIZER`] but keeping the markup it strips, so
/// the two outputs differ only where content would be removed.
static PASSTHROUGH: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::default();
    builder
        .link_rel(None)
        .rm_clean_content_tags(["script", "style"])
        .add_tags([
            "script", "style", "iframe", "frame", "frameset", "object", "embed", "applet",
            "form", "input", "button", "textarea", "select", "option", "svg", "math", "link",
            "meta", "base",
        ])
        .add_generic_attributes(["style", "srcdoc", "action", "formaction", "srcset"])
        .add_generic_attribute_prefixes(["on"])
        .add_url_schemes(["javascript", "vbscript", "data", "file"]);
    builder
});

/// Markup the sanitizer would not strip anything from.
///
/// Both sides go through the same HTML serializer, so entity escaping,
/// void-tag spelling and attribute quoting do not count as changes.
pub(crate) fn is_clean_markup(s: &str) -> bool {
    SANITIZER.clean(s).to_string() == PASSTHROUGH.clean(s).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_valid_email("hello@example.com"));
        assert!(!is_valid_email("hello"));
        assert!(!is_valid_email("a@b@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("hello@localhost"));
        assert!(!is_valid_email("hel lo@example.com"));
    }

    #[test]
    fn urls() {
        assert!(is_valid_url("https://example.com/about"));
        assert!(is_valid_url("ftp://files.example.com"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("mailto:someone@example.com"));
        assert!(!is_valid_url("/relative/path"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn markup() {
        assert!(is_clean_markup("<p>Building <strong>things</strong></p>"));
        assert!(!is_clean_markup("<p onclick=\"x()\">hi</p>"));
        assert!(!is_clean_markup("<script>alert(1)</script>"));
        assert!(!is_clean_markup("<a href=\"javascript:alert(1)\">x</a>"));
        assert!(!is_clean_markup("<iframe src=\"https://example.com\"></iframe>"));
    }

    #[test]
    fn markup_normalization_is_not_a_violation() {
        assert!(is_clean_markup(
            "<p>See <a href=\"https://example.com\">my site</a></p>"
        ));
        assert!(is_clean_markup("<p>Tom & Jerry</p>"));
        assert!(is_clean_markup("<p>line<br/>break</p>"));
        assert!(is_clean_markup("plain text with <em>emphasis</em>"));
    }
}
