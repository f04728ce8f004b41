//! Page revisions.

use ramo_sdk::types::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::{BlockRegistry, decode, encode};
use crate::error::CoreResult;

/// An immutable content snapshot of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub page_id: Uuid,
    /// Position in the page's history, starting at 1.
    pub sequence: u64,
    pub content: Document,
    /// Unix timestamp when this revision was created.
    pub created_at: i64,
    pub author: Option<String>,
}

impl Revision {
    pub fn to_record(&self) -> RevisionRecord {
        RevisionRecord {
            page_id: self.page_id,
            sequence_number: self.sequence,
            content_json: encode(&self.content),
            created_at: self.created_at,
            author_ref: self.author.clone(),
        }
    }

    /// Rebuild a revision, keeping kinds the registry does not know.
    pub fn from_record(record: RevisionRecord, registry: &BlockRegistry) -> CoreResult<Self> {
        Ok(Self {
            page_id: record.page_id,
            sequence: record.sequence_number,
            content: decode(&record.content_json, registry)?,
            created_at: record.created_at,
            author: record.author_ref,
        })
    }
}

/// Persisted revision record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRecord {
    pub page_id: Uuid,
    pub sequence_number: u64,
    pub content_json: Value,
    pub created_at: i64,
    pub author_ref: Option<String>,
}
