//! Content module.
//!
//! This module provides:
//! - BlockRegistry: Block kind and page type declarations
//! - validate: Recursive schema validation with a full violation report
//! - encode/decode: Lossless wire codec for documents
//! - library: Standard block kinds and page types
//! - PageService: Revisioned pages bound to the page tree

pub mod codec;
pub mod library;
mod page_service;
mod registry;
mod scalars;
mod validator;

pub use codec::{decode, decode_str, decode_strict, encode};
pub use page_service::{PageService, SiteExport};
pub use registry::{BlockRegistry, ResolvedKind};
pub use validator::{
    ParseModeError, ValidationMode, ValidationReport, Violation, ViolationReason, validate,
    validate_for_page_type,
};
