//! Page tree.
//!
//! Pages form a forest addressed by materialized paths: a node's path is its
//! parent's path plus one fixed-width segment, so structural queries are
//! range scans over path order and sibling order needs no position counter.

pub mod path;
mod slug;
mod snapshot;
mod store;

pub use slug::{MAX_SLUG_LENGTH, slugify, validate_slug};
pub use snapshot::{TreeNode, TreeSnapshot};
pub use store::TreeStore;

/// Default segment width: 36^4 - 1 children per parent.
pub const DEFAULT_SEGMENT_WIDTH: usize = 4;

/// Widest supported segment.
pub const MAX_SEGMENT_WIDTH: usize = 8;
