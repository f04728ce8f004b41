//! Revisioned page service.
//!
//! Binds tree nodes to an append-only revision history and a publish state
//! machine. Structure lives in the [`TreeStore`]; each page's revisions and
//! status live in a per-page ledger so that saving on one page never waits
//! on another page or on tree readers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use ramo_sdk::types::Document;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use super::{BlockRegistry, ValidationMode, validate, validate_for_page_type};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::events::{ContentEvent, EventBus};
use crate::models::{
    PageNode, PageRecord, PublishState, PublishStatus, Revision, RevisionRecord,
};
use crate::tree::{TreeNode, TreeSnapshot, TreeStore};

/// Every page and revision of a site, in path and sequence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteExport {
    pub pages: Vec<PageRecord>,
    pub revisions: Vec<RevisionRecord>,
}

/// Service for pages: tree placement, revisions and publishing.
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct PageService {
    inner: Arc<PageServiceInner>,
}

struct PageServiceInner {
    registry: BlockRegistry,
    tree: TreeStore,
    pages: DashMap<Uuid, Arc<PageEntry>>,
    events: EventBus,
    default_mode: ValidationMode,
}

#[derive(Default)]
struct PageEntry {
    ledger: RwLock<PageLedger>,
}

#[derive(Default)]
struct PageLedger {
    status: PublishStatus,
    revisions: Vec<Arc<Revision>>,
    /// Set once the page is deleted; late writers holding the entry fail.
    removed: bool,
}

impl PageLedger {
    fn revision(&self, page_id: Uuid, sequence: u64) -> CoreResult<&Arc<Revision>> {
        sequence
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.revisions.get(i))
            .ok_or_else(|| CoreError::revision_not_found(page_id, sequence))
    }

    fn live_document(&self) -> Option<Document> {
        if self.status.state != PublishState::Live {
            return None;
        }
        let sequence = self.status.live_revision?;
        let index = usize::try_from(sequence.checked_sub(1)?).ok()?;
        self.revisions.get(index).map(|r| r.content.clone())
    }
}

impl PageService {
    /// Create a page service with default configuration.
    pub fn new(registry: BlockRegistry) -> Self {
        Self::with_config(registry, &Config::default())
    }

    /// Create a page service using the tree width, event capacity and
    /// validation mode from `config`.
    pub fn with_config(registry: BlockRegistry, config: &Config) -> Self {
        Self {
            inner: Arc::new(PageServiceInner {
                registry,
                tree: TreeStore::with_segment_width(config.segment_width),
                pages: DashMap::new(),
                events: EventBus::new(config.event_capacity),
                default_mode: config.validation_mode,
            }),
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.inner.registry
    }

    /// Point-in-time view of the page tree, for structural queries.
    ///
    /// Structure only changes through this service, so ledgers and tree
    /// nodes stay in step.
    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        self.inner.tree.snapshot()
    }

    /// Mode used by [`save_revision`](Self::save_revision).
    pub fn validation_mode(&self) -> ValidationMode {
        self.inner.default_mode
    }

    /// Subscribe to content events committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ContentEvent> {
        self.inner.events.subscribe()
    }

    /// Ledger of a page that is still in the tree.
    fn entry(&self, page_id: Uuid) -> CoreResult<Arc<PageEntry>> {
        if !self.inner.tree.contains(page_id) {
            return Err(CoreError::page_not_found(page_id));
        }
        self.inner
            .pages
            .get(&page_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| CoreError::page_not_found(page_id))
    }

    fn status(&self, page_id: Uuid) -> PublishStatus {
        self.inner
            .pages
            .get(&page_id)
            .map(|e| e.ledger.read().status.clone())
            .unwrap_or_default()
    }

    fn page_node(&self, node: TreeNode) -> PageNode {
        let status = self.status(node.id);
        PageNode::from_parts(node, &status)
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Create a draft page as the last child of `parent` (a root for
    /// `None`).
    ///
    /// When the registry declares page types, `type_tag` must be one of
    /// them.
    pub fn create_page(
        &self,
        parent: Option<Uuid>,
        slug: &str,
        type_tag: &str,
    ) -> CoreResult<PageNode> {
        let registry = &self.inner.registry;
        if registry.has_page_types() && registry.page_type(type_tag).is_none() {
            return Err(CoreError::NotFound {
                entity: "page type",
                id: type_tag.to_string(),
            });
        }

        let id = Uuid::now_v7();
        self.inner.pages.insert(id, Arc::new(PageEntry::default()));
        match self.inner.tree.create_node_with_id(id, parent, slug, type_tag) {
            Ok(node) => {
                info!(page_id = %id, slug = %slug, type_tag = %type_tag, "page created");
                Ok(self.page_node(node))
            }
            Err(e) => {
                self.inner.pages.remove(&id);
                Err(e)
            }
        }
    }

    /// Move a page and its subtree under `new_parent`, optionally renaming
    /// it.
    pub fn move_page(
        &self,
        page_id: Uuid,
        new_parent: Option<Uuid>,
        new_slug: Option<&str>,
    ) -> CoreResult<PageNode> {
        let node = self.inner.tree.move_node(page_id, new_parent, new_slug)?;
        self.inner.events.emit(ContentEvent::PageMoved {
            page_id,
            path: node.path.clone(),
        });
        Ok(self.page_node(node))
    }

    /// Delete a page. With `cascade`, its descendants and every revision of
    /// every removed page go too.
    ///
    /// Returns the removed page ids, the target first.
    pub fn delete_page(&self, page_id: Uuid, cascade: bool) -> CoreResult<Vec<Uuid>> {
        let removed = self.inner.tree.delete_node(page_id, cascade)?;
        let page_ids: Vec<Uuid> = removed.iter().map(|n| n.id).collect();
        for id in &page_ids {
            if let Some((_, entry)) = self.inner.pages.remove(id) {
                let mut ledger = entry.ledger.write();
                ledger.removed = true;
                ledger.revisions.clear();
            }
        }

        info!(page_id = %page_id, removed = page_ids.len(), "page deleted");
        self.inner.events.emit(ContentEvent::PagesDeleted {
            page_ids: page_ids.clone(),
        });
        Ok(page_ids)
    }

    /// Look up a page.
    pub fn page(&self, page_id: Uuid) -> CoreResult<PageNode> {
        let node = self.inner.tree.node(page_id)?;
        Ok(self.page_node(node))
    }

    /// Every page, in path order.
    pub fn pages(&self) -> Vec<PageNode> {
        self.inner
            .tree
            .snapshot()
            .iter()
            .map(|node| self.page_node(node.clone()))
            .collect()
    }

    /// Live pages below `page_id`, optionally of one type, most recently
    /// first published first.
    pub fn live_descendants(
        &self,
        page_id: Uuid,
        type_tag: Option<&str>,
    ) -> CoreResult<Vec<PageNode>> {
        let snapshot = self.inner.tree.snapshot();
        let mut pages: Vec<PageNode> = snapshot
            .descendants(page_id)?
            .into_iter()
            .filter(|node| type_tag.is_none_or(|t| node.type_tag == t))
            .map(|node| self.page_node(node.clone()))
            .filter(|page| page.state == PublishState::Live)
            .collect();
        pages.sort_by(|a, b| b.first_published_at.cmp(&a.first_published_at));
        Ok(pages)
    }

    // -------------------------------------------------------------------------
    // Revisions
    // -------------------------------------------------------------------------

    /// Validate `document` in the configured mode and append it as the
    /// page's next revision. Returns the new sequence number.
    pub fn save_revision(
        &self,
        page_id: Uuid,
        document: Document,
        author: Option<&str>,
    ) -> CoreResult<u64> {
        self.save_revision_with_mode(page_id, document, author, self.inner.default_mode)
    }

    /// Validate `document` in `mode` and append it as the page's next
    /// revision.
    ///
    /// Pages whose type is registered are also held to that type's block
    /// rules. A document that fails validation is not stored.
    pub fn save_revision_with_mode(
        &self,
        page_id: Uuid,
        document: Document,
        author: Option<&str>,
        mode: ValidationMode,
    ) -> CoreResult<u64> {
        let entry = self.entry(page_id)?;
        let node = self.inner.tree.node(page_id)?;
        let registry = &self.inner.registry;
        let checked = match registry.page_type(&node.type_tag) {
            Some(page_type) => validate_for_page_type(&document, registry, &page_type, mode),
            None => validate(&document, registry, mode),
        };
        if let Err(report) = checked {
            warn!(page_id = %page_id, violations = report.len(), "document rejected");
            return Err(CoreError::Validation(report));
        }

        let sequence = {
            let mut ledger = entry.ledger.write();
            if ledger.removed {
                return Err(CoreError::page_not_found(page_id));
            }
            let sequence = ledger.revisions.len() as u64 + 1;
            ledger.revisions.push(Arc::new(Revision {
                page_id,
                sequence,
                content: document,
                created_at: Utc::now().timestamp(),
                author: author.map(str::to_string),
            }));
            sequence
        };

        info!(page_id = %page_id, sequence, "revision saved");
        self.inner
            .events
            .emit(ContentEvent::RevisionSaved { page_id, sequence });
        Ok(sequence)
    }

    /// A single revision.
    pub fn revision(&self, page_id: Uuid, sequence: u64) -> CoreResult<Arc<Revision>> {
        let entry = self.entry(page_id)?;
        let ledger = entry.ledger.read();
        ledger.revision(page_id, sequence).cloned()
    }

    /// All revisions, oldest first.
    pub fn revisions(&self, page_id: Uuid) -> CoreResult<Vec<Arc<Revision>>> {
        let entry = self.entry(page_id)?;
        let revisions = entry.ledger.read().revisions.clone();
        Ok(revisions)
    }

    pub fn latest_revision(&self, page_id: Uuid) -> CoreResult<Option<Arc<Revision>>> {
        let entry = self.entry(page_id)?;
        let latest = entry.ledger.read().revisions.last().cloned();
        Ok(latest)
    }

    /// Save a copy of an earlier revision's content as a new revision.
    pub fn revert_to_revision(
        &self,
        page_id: Uuid,
        sequence: u64,
        author: Option<&str>,
    ) -> CoreResult<u64> {
        let content = self.revision(page_id, sequence)?.content.clone();
        let new_sequence = self.save_revision(page_id, content, author)?;
        info!(page_id = %page_id, from = sequence, to = new_sequence, "page reverted");
        Ok(new_sequence)
    }

    // -------------------------------------------------------------------------
    // Publishing
    // -------------------------------------------------------------------------

    /// Promote a revision to live. Legal from draft or unpublished.
    pub fn publish(&self, page_id: Uuid, sequence: u64) -> CoreResult<()> {
        let entry = self.entry(page_id)?;
        {
            let mut ledger = entry.ledger.write();
            if ledger.removed {
                return Err(CoreError::page_not_found(page_id));
            }
            ledger.revision(page_id, sequence)?;
            ledger
                .status
                .publish(page_id, sequence, Utc::now().timestamp())?;
        }

        info!(page_id = %page_id, sequence, "page published");
        self.inner
            .events
            .emit(ContentEvent::Published { page_id, sequence });
        Ok(())
    }

    /// Hide a live page, keeping its live revision for re-publishing.
    pub fn unpublish(&self, page_id: Uuid) -> CoreResult<()> {
        let entry = self.entry(page_id)?;
        entry.ledger.write().status.unpublish(page_id)?;

        info!(page_id = %page_id, "page unpublished");
        self.inner
            .events
            .emit(ContentEvent::Unpublished { page_id });
        Ok(())
    }

    pub fn set_members_only(&self, page_id: Uuid, members_only: bool) -> CoreResult<()> {
        let entry = self.entry(page_id)?;
        entry.ledger.write().status.members_only = members_only;
        info!(page_id = %page_id, members_only, "page access changed");
        Ok(())
    }

    /// The document of the live revision, while the page is live.
    pub fn live_document(&self, page_id: Uuid) -> CoreResult<Option<Document>> {
        let entry = self.entry(page_id)?;
        let document = entry.ledger.read().live_document();
        Ok(document)
    }

    /// The live document if the page is visible to the caller.
    pub fn visible_document(
        &self,
        page_id: Uuid,
        is_member: bool,
    ) -> CoreResult<Option<Document>> {
        let entry = self.entry(page_id)?;
        let ledger = entry.ledger.read();
        if !ledger.status.is_visible(is_member) {
            return Ok(None);
        }
        Ok(ledger.live_document())
    }

    // -------------------------------------------------------------------------
    // Export / import
    // -------------------------------------------------------------------------

    /// Every page and revision as persisted records.
    pub fn export(&self) -> SiteExport {
        let snapshot = self.inner.tree.snapshot();
        let mut export = SiteExport::default();
        for node in snapshot.iter() {
            let Ok(entry) = self.entry(node.id) else {
                continue;
            };
            let ledger = entry.ledger.read();
            export
                .pages
                .push(PageNode::from_parts(node.clone(), &ledger.status).to_record());
            export
                .revisions
                .extend(ledger.revisions.iter().map(|r| r.to_record()));
        }
        export
    }

    /// Load an export into this (empty) service.
    ///
    /// Content is decoded leniently so kinds missing from this registry
    /// are kept. Nothing is loaded unless every record is consistent.
    pub fn import(&self, export: SiteExport) -> CoreResult<()> {
        if !self.inner.pages.is_empty() || !self.inner.tree.is_empty() {
            return Err(CoreError::import("the page service is not empty"));
        }

        let mut history: HashMap<Uuid, Vec<Revision>> = HashMap::new();
        for record in export.revisions {
            let revision = Revision::from_record(record, &self.inner.registry)?;
            history.entry(revision.page_id).or_default().push(revision);
        }

        let mut nodes = Vec::with_capacity(export.pages.len());
        let mut ledgers = Vec::with_capacity(export.pages.len());
        for record in export.pages {
            let (node, status) = record.into_parts();
            let mut revisions = history.remove(&node.id).unwrap_or_default();
            revisions.sort_by_key(|r| r.sequence);
            if revisions
                .iter()
                .zip(1u64..)
                .any(|(r, expected)| r.sequence != expected)
            {
                return Err(CoreError::import(format!(
                    "page {}: revision sequence numbers are not 1..=n",
                    node.id
                )));
            }
            let live_ok = match (status.state, status.live_revision) {
                (PublishState::Draft, None) => true,
                (PublishState::Draft, Some(_)) => false,
                (_, Some(sequence)) => (1..=revisions.len() as u64).contains(&sequence),
                (_, None) => false,
            };
            if !live_ok {
                return Err(CoreError::import(format!(
                    "page {}: state {} does not match its live revision",
                    node.id, status.state
                )));
            }
            ledgers.push((
                node.id,
                PageLedger {
                    status,
                    revisions: revisions.into_iter().map(Arc::new).collect(),
                    removed: false,
                },
            ));
            nodes.push(node);
        }
        if let Some(orphan) = history.keys().next() {
            return Err(CoreError::import(format!(
                "revisions reference unknown page {orphan}"
            )));
        }

        self.inner.tree.restore(nodes)?;
        let count = ledgers.len();
        for (id, ledger) in ledgers {
            self.inner.pages.insert(
                id,
                Arc::new(PageEntry {
                    ledger: RwLock::new(ledger),
                }),
            );
        }
        info!(pages = count, "site imported");
        Ok(())
    }
}
