//! Ramo content storage core.
//!
//! A materialized-path page tree whose pages carry revisioned,
//! schema-validated block documents with a draft/publish lifecycle. The
//! `ramo` binary wraps the library for seeding and inspecting sites.

pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod models;
pub mod seed;
pub mod tree;

pub use config::Config;
pub use content::{BlockRegistry, PageService, ValidationMode};
pub use error::{CoreError, CoreResult};
pub use events::ContentEvent;
pub use tree::TreeStore;
