//! Page and revision models.

pub mod page;
pub mod revision;

pub use page::{PageNode, PageRecord, PublishState, PublishStatus};
pub use revision::{Revision, RevisionRecord};
