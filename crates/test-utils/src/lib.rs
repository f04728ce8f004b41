//! Ramo test utilities.
//!
//! Fixtures shared by the kernel integration tests: a small block
//! vocabulary, document builders and assertion helpers for materialized
//! paths.

use ramo_sdk::schema::{FieldDescriptor, KindDescriptor, PageTypeSchema, PrimitiveType};
use ramo_sdk::types::{BlockInstance, Document};

/// Kinds used across the scenario tests.
///
/// `section` is a struct with a required `heading` (text) and `count`
/// (integer); `cards` is a list of `card` structs holding one to three
/// items.
pub fn scenario_kinds() -> Vec<KindDescriptor> {
    vec![
        KindDescriptor::scalar("text", PrimitiveType::Text).max_length(120),
        KindDescriptor::scalar("integer", PrimitiveType::Integer),
        KindDescriptor::scalar("url", PrimitiveType::Url),
        KindDescriptor::structure("section")
            .field(FieldDescriptor::new("heading", "text"))
            .field(FieldDescriptor::new("count", "integer")),
        KindDescriptor::structure("card")
            .field(FieldDescriptor::new("title", "text"))
            .field(FieldDescriptor::new("link", "url").optional()),
        KindDescriptor::list("cards", "card").count(1, Some(3)),
    ]
}

/// Page types matching [`scenario_kinds`].
pub fn scenario_page_types() -> Vec<PageTypeSchema> {
    vec![
        PageTypeSchema::new("home", "Home").allow_all(&["section", "cards", "text"]),
        PageTypeSchema::new("blog", "Blog Post")
            .allow_all(&["section", "text"])
            .blocks(1, None),
    ]
}

/// Document builders.
pub mod docs {
    use super::{BlockInstance, Document};

    /// A `section` block.
    pub fn section(heading: &str, count: i64) -> BlockInstance {
        BlockInstance::structure(
            "section",
            [
                ("heading", BlockInstance::primitive("text", heading)),
                ("count", BlockInstance::primitive("integer", count)),
            ],
        )
    }

    pub fn card(title: &str) -> BlockInstance {
        BlockInstance::structure("card", [("title", BlockInstance::primitive("text", title))])
    }

    /// A `cards` list with `n` numbered cards.
    pub fn cards(n: usize) -> BlockInstance {
        let items = (1..=n).map(|i| card(&format!("Card {i}"))).collect();
        BlockInstance::list("cards", items)
    }

    /// A document holding a single `section`.
    pub fn single_section(heading: &str, count: i64) -> Document {
        Document::new().with(section(heading, count))
    }

    pub fn text(value: &str) -> BlockInstance {
        BlockInstance::primitive("text", value)
    }

    /// Wire form of [`section`], as a top-level envelope.
    pub fn section_wire(heading: &str, count: i64) -> serde_json::Value {
        serde_json::json!({
            "kind": "section",
            "value": { "heading": heading, "count": count }
        })
    }
}

/// Assertion helpers.
pub mod assert {
    /// Assert that `path` lies strictly below `ancestor`.
    pub fn path_under(path: &str, ancestor: &str) {
        assert!(
            path.len() > ancestor.len() && path.starts_with(ancestor),
            "Expected path '{path}' to lie under '{ancestor}'"
        );
    }

    /// Assert that paths are strictly increasing.
    pub fn sorted_paths<S: AsRef<str>>(paths: &[S]) {
        for pair in paths.windows(2) {
            let (a, b) = (pair[0].as_ref(), pair[1].as_ref());
            assert!(a < b, "Expected '{a}' to sort before '{b}'");
        }
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }
}
