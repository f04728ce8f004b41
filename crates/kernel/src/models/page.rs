//! Page model and publish lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::tree::TreeNode;

/// Publish state of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishState {
    /// Never published.
    #[default]
    Draft,
    /// A revision is promoted and visible.
    Live,
    /// Was live, now hidden. The live revision is kept for re-publishing.
    Unpublished,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Live => "live",
            Self::Unpublished => "unpublished",
        }
    }

    pub fn can_publish(&self) -> bool {
        matches!(self, Self::Draft | Self::Unpublished)
    }

    pub fn can_unpublish(&self) -> bool {
        *self == Self::Live
    }

    /// Live, and either open to everyone or the caller is a member.
    pub fn is_visible(&self, members_only: bool, is_member: bool) -> bool {
        *self == Self::Live && (!members_only || is_member)
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publish lifecycle and access flag of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishStatus {
    pub state: PublishState,
    /// Sequence number of the promoted revision.
    pub live_revision: Option<u64>,
    pub members_only: bool,
    /// Unix timestamp of the first publish.
    pub first_published_at: Option<i64>,
    /// Unix timestamp of the latest publish.
    pub last_published_at: Option<i64>,
}

impl PublishStatus {
    /// Promote revision `sequence`. Legal from draft or unpublished.
    pub fn publish(&mut self, page_id: Uuid, sequence: u64, now: i64) -> CoreResult<()> {
        if !self.state.can_publish() {
            return Err(CoreError::InvalidTransition {
                page_id,
                action: "publish",
                state: self.state,
            });
        }
        self.state = PublishState::Live;
        self.live_revision = Some(sequence);
        self.first_published_at.get_or_insert(now);
        self.last_published_at = Some(now);
        Ok(())
    }

    /// Hide the page, keeping the live revision. Legal only from live.
    pub fn unpublish(&mut self, page_id: Uuid) -> CoreResult<()> {
        if !self.state.can_unpublish() {
            return Err(CoreError::InvalidTransition {
                page_id,
                action: "unpublish",
                state: self.state,
            });
        }
        self.state = PublishState::Unpublished;
        Ok(())
    }

    pub fn is_visible(&self, is_member: bool) -> bool {
        self.state.is_visible(self.members_only, is_member)
    }
}

/// A page: its tree position joined with its publish status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageNode {
    pub id: Uuid,
    pub path: String,
    pub depth: usize,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub type_tag: String,
    pub live_revision_id: Option<u64>,
    pub members_only: bool,
    pub state: PublishState,
    pub first_published_at: Option<i64>,
    pub last_published_at: Option<i64>,
}

impl PageNode {
    pub fn from_parts(node: TreeNode, status: &PublishStatus) -> Self {
        Self {
            id: node.id,
            path: node.path,
            depth: node.depth,
            slug: node.slug,
            parent_id: node.parent_id,
            type_tag: node.type_tag,
            live_revision_id: status.live_revision,
            members_only: status.members_only,
            state: status.state,
            first_published_at: status.first_published_at,
            last_published_at: status.last_published_at,
        }
    }

    pub fn is_visible(&self, is_member: bool) -> bool {
        self.state.is_visible(self.members_only, is_member)
    }

    pub fn to_record(&self) -> PageRecord {
        PageRecord {
            id: self.id,
            path: self.path.clone(),
            depth: self.depth,
            slug: self.slug.clone(),
            parent_id: self.parent_id,
            type_tag: self.type_tag.clone(),
            live_revision_id: self.live_revision_id,
            members_only: self.members_only,
            state: self.state,
            first_published_at: self.first_published_at,
            last_published_at: self.last_published_at,
        }
    }
}

/// Persisted page record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub id: Uuid,
    pub path: String,
    pub depth: usize,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub type_tag: String,
    pub live_revision_id: Option<u64>,
    pub members_only: bool,
    pub state: PublishState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_published_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_published_at: Option<i64>,
}

impl PageRecord {
    /// Split into the tree node and publish status it was built from.
    pub fn into_parts(self) -> (TreeNode, PublishStatus) {
        let status = PublishStatus {
            state: self.state,
            live_revision: self.live_revision_id,
            members_only: self.members_only,
            first_published_at: self.first_published_at,
            last_published_at: self.last_published_at,
        };
        let node = TreeNode {
            id: self.id,
            path: self.path,
            depth: self.depth,
            slug: self.slug,
            parent_id: self.parent_id,
            type_tag: self.type_tag,
        };
        (node, status)
    }
}
