//! Core error types.
//!
//! Every fallible kernel operation returns [`CoreError`]. Structural errors
//! are raised before anything is committed, so a failed call leaves the
//! store exactly as it found it.

use ramo_sdk::types::BlockPath;
use thiserror::Error;
use uuid::Uuid;

use crate::content::ValidationReport;
use crate::models::PublishState;

/// Errors raised by the registry, codec, validator, tree store and page
/// service.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The document broke one or more schema rules. Carries every violation.
    #[error("document failed validation: {0}")]
    Validation(ValidationReport),

    /// A kind tag was registered twice.
    #[error("block kind '{kind}' is already registered")]
    DuplicateKind { kind: String },

    /// A kind tag is not in the registry.
    #[error("unknown block kind '{kind}'")]
    UnknownKind { kind: String },

    /// A wire payload does not have the JSON shape its kind requires.
    #[error("malformed document at {path}: {reason}")]
    MalformedDocument { path: BlockPath, reason: String },

    /// A descriptor is unusable (e.g. a choice with no tokens).
    #[error("invalid schema for '{kind}': {reason}")]
    Schema { kind: String, reason: String },

    /// Another child of the same parent already has this slug.
    #[error("slug '{slug}' is already used by a sibling")]
    SlugConflict { slug: String },

    /// Slug is empty, too long or not URL-safe.
    #[error("invalid slug '{slug}': {reason}")]
    InvalidSlug { slug: String, reason: String },

    /// Every segment value under this parent is taken.
    #[error("no free path segment under '{parent_path}'")]
    PathExhausted { parent_path: String },

    /// Destination parent is the node itself or one of its descendants.
    #[error("cannot move page {page_id} into its own subtree")]
    CyclicMove { page_id: Uuid },

    /// Non-cascading delete of a node that still has descendants.
    #[error("page {page_id} has {descendants} descendant(s); delete with cascade to remove them")]
    NonEmptySubtree { page_id: Uuid, descendants: usize },

    /// The publish state machine does not allow this action.
    #[error("cannot {action} page {page_id} while it is {state}")]
    InvalidTransition {
        page_id: Uuid,
        action: &'static str,
        state: PublishState,
    },

    /// Exported records do not describe a consistent site.
    #[error("cannot import site: {reason}")]
    Import { reason: String },

    /// A page, revision or page type does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl CoreError {
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    pub fn malformed(path: &BlockPath, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    pub fn schema(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_slug(slug: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSlug {
            slug: slug.into(),
            reason: reason.into(),
        }
    }

    pub fn import(reason: impl Into<String>) -> Self {
        Self::Import {
            reason: reason.into(),
        }
    }

    pub fn page_not_found(page_id: Uuid) -> Self {
        Self::NotFound {
            entity: "page",
            id: page_id.to_string(),
        }
    }

    pub fn revision_not_found(page_id: Uuid, sequence: u64) -> Self {
        Self::NotFound {
            entity: "revision",
            id: format!("{page_id}#{sequence}"),
        }
    }

    /// True for errors caused by the shape of the submitted content rather
    /// than the state of the store.
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::UnknownKind { .. } | Self::MalformedDocument { .. }
        )
    }
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn malformed_error_names_position() {
        let path = BlockPath::root().index(2).field("cards");
        let err = CoreError::malformed(&path, "expected an array");
        assert_eq!(
            err.to_string(),
            "malformed document at $[2].cards: expected an array"
        );
        assert!(err.is_content_error());
    }

    #[test]
    fn transition_error_mentions_state() {
        let err = CoreError::InvalidTransition {
            page_id: Uuid::nil(),
            action: "unpublish",
            state: PublishState::Draft,
        };
        let msg = err.to_string();
        assert!(msg.contains("unpublish"));
        assert!(msg.contains("draft"));
        assert!(!err.is_content_error());
    }

    #[test]
    fn revision_not_found_includes_sequence() {
        let err = CoreError::revision_not_found(Uuid::nil(), 7);
        assert!(err.to_string().ends_with("#7"));
    }
}
