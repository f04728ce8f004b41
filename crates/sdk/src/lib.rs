//! Ramo SDK
//!
//! Content document and block schema types. The kernel validates, encodes
//! and stores these; rendering, search and editing collaborators depend on
//! this crate alone to read and build documents.

pub mod schema;
pub mod types;

pub mod prelude {
    pub use crate::schema::*;
    pub use crate::types::*;
}
