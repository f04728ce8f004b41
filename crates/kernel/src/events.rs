//! Content events.
//!
//! Search indexing and cache invalidation learn about content changes by
//! subscribing here; the core never calls them directly.

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// A committed content change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent {
    RevisionSaved { page_id: Uuid, sequence: u64 },
    Published { page_id: Uuid, sequence: u64 },
    Unpublished { page_id: Uuid },
    PageMoved { page_id: Uuid, path: String },
    /// A delete removed these pages, the target first.
    PagesDeleted { page_ids: Vec<Uuid> },
}

/// Fan-out channel for [`ContentEvent`]s.
///
/// Emitting never blocks. Subscribers that fall behind by more than the
/// channel capacity miss the oldest events and see `Lagged` on receive.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ContentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContentEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ContentEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!(?event, "content event dropped, no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
