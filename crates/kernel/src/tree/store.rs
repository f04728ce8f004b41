//! The page tree store.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::path;
use super::slug::validate_slug;
use super::snapshot::{TreeNode, TreeSnapshot};
use super::{DEFAULT_SEGMENT_WIDTH, MAX_SEGMENT_WIDTH};
use crate::error::{CoreError, CoreResult};

/// Materialized-path tree of pages.
///
/// Readers take the current [`TreeSnapshot`] and query it without holding
/// any lock. Writers are serialized: each mutation checks its preconditions
/// against the current snapshot, builds the next one and swaps it in, so a
/// failed mutation publishes nothing and a successful one is observed all at
/// once.
pub struct TreeStore {
    width: usize,
    current: RwLock<Arc<TreeSnapshot>>,
    writer: Mutex<()>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    /// Create an empty tree with the default segment width.
    pub fn new() -> Self {
        Self::with_segment_width(DEFAULT_SEGMENT_WIDTH)
    }

    /// Create an empty tree; `width` is clamped to `1..=MAX_SEGMENT_WIDTH`.
    pub fn with_segment_width(width: usize) -> Self {
        let width = width.clamp(1, MAX_SEGMENT_WIDTH);
        Self {
            width,
            current: RwLock::new(Arc::new(TreeSnapshot::empty(width))),
            writer: Mutex::new(()),
        }
    }

    pub fn segment_width(&self) -> usize {
        self.width
    }

    /// The current snapshot. Use it when several queries must agree.
    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        Arc::clone(&self.current.read())
    }

    fn publish(&self, next: TreeSnapshot) {
        *self.current.write() = Arc::new(next);
    }

    /// Segment one past the highest sibling under the node at `parent_path`.
    ///
    /// Gaps left by deleted siblings are never filled, so a new node always
    /// sorts last and `PathExhausted` depends on the highest segment in use,
    /// not on the number of siblings.
    fn next_segment(&self, snapshot: &TreeSnapshot, parent_path: &str) -> CoreResult<String> {
        let value = snapshot
            .max_child_segment(parent_path)
            .map_or(1, |max| max + 1);
        path::encode_segment(value, self.width).ok_or_else(|| CoreError::PathExhausted {
            parent_path: parent_path.to_string(),
        })
    }

    /// Create a node as the last child of `parent` (a root for `None`).
    pub fn create_node(
        &self,
        parent: Option<Uuid>,
        slug: &str,
        type_tag: &str,
    ) -> CoreResult<TreeNode> {
        self.create_node_with_id(Uuid::now_v7(), parent, slug, type_tag)
    }

    /// Create a node under a caller-chosen id, which must not be in use.
    pub(crate) fn create_node_with_id(
        &self,
        id: Uuid,
        parent: Option<Uuid>,
        slug: &str,
        type_tag: &str,
    ) -> CoreResult<TreeNode> {
        validate_slug(slug)?;

        let _writer = self.writer.lock();
        let current = self.snapshot();
        let parent_path = match parent {
            Some(parent_id) => current.node(parent_id)?.path.clone(),
            None => String::new(),
        };
        if current.child_by_slug(parent, slug).is_some() {
            return Err(CoreError::SlugConflict {
                slug: slug.to_string(),
            });
        }
        let segment = self.next_segment(&current, &parent_path)?;

        let node = TreeNode {
            id,
            path: format!("{parent_path}{segment}"),
            depth: parent_path.len() / self.width + 1,
            slug: slug.to_string(),
            parent_id: parent,
            type_tag: type_tag.to_string(),
        };
        let mut next = TreeSnapshot::clone(&current);
        next.insert(node.clone());
        self.publish(next);

        info!(page_id = %id, path = %node.path, slug = %slug, "tree node created");
        Ok(node)
    }

    /// Move a node (and its subtree) to the end of `new_parent`'s children,
    /// optionally renaming it.
    ///
    /// Every descendant keeps its position relative to the moved node.
    pub fn move_node(
        &self,
        id: Uuid,
        new_parent: Option<Uuid>,
        new_slug: Option<&str>,
    ) -> CoreResult<TreeNode> {
        if let Some(slug) = new_slug {
            validate_slug(slug)?;
        }

        let _writer = self.writer.lock();
        let current = self.snapshot();
        let node = current.node(id)?;

        let dest_path = match new_parent {
            Some(parent_id) => {
                let dest = current.node(parent_id)?;
                if parent_id == id || node.is_ancestor_of(dest) {
                    return Err(CoreError::CyclicMove { page_id: id });
                }
                dest.path.clone()
            }
            None => String::new(),
        };
        let slug = new_slug.unwrap_or(&node.slug).to_string();
        if let Some(existing) = current.child_by_slug(new_parent, &slug)
            && existing.id != id
        {
            return Err(CoreError::SlugConflict { slug });
        }
        let new_path = format!("{dest_path}{}", self.next_segment(&current, &dest_path)?);

        let old_path = node.path.clone();
        let subtree: Vec<TreeNode> = current.subtree_range(&old_path).cloned().collect();
        let mut next = TreeSnapshot::clone(&current);
        for n in &subtree {
            next.remove(n.id);
        }
        let mut moved = None;
        for mut n in subtree {
            n.path = format!("{new_path}{}", &n.path[old_path.len()..]);
            n.depth = n.path.len() / self.width;
            if n.id == id {
                n.slug.clone_from(&slug);
                n.parent_id = new_parent;
                moved = Some(n.clone());
            }
            next.insert(n);
        }
        let moved = moved.ok_or_else(|| CoreError::page_not_found(id))?;
        self.publish(next);

        info!(
            page_id = %id,
            from = %old_path,
            to = %moved.path,
            slug = %moved.slug,
            "tree node moved"
        );
        Ok(moved)
    }

    /// Delete a node. With `cascade`, its whole subtree goes too; without,
    /// a node with descendants is refused.
    ///
    /// Returns the removed nodes in path order.
    pub fn delete_node(&self, id: Uuid, cascade: bool) -> CoreResult<Vec<TreeNode>> {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let node = current.node(id)?;
        let removed: Vec<TreeNode> = current.subtree_range(&node.path).cloned().collect();
        if !cascade && removed.len() > 1 {
            return Err(CoreError::NonEmptySubtree {
                page_id: id,
                descendants: removed.len() - 1,
            });
        }

        let mut next = TreeSnapshot::clone(&current);
        for n in &removed {
            next.remove(n.id);
        }
        self.publish(next);

        info!(page_id = %id, removed = removed.len(), "tree node deleted");
        Ok(removed)
    }

    /// Load nodes into an empty tree, checking that they form a consistent
    /// tree of this store's segment width.
    pub(crate) fn restore(&self, nodes: Vec<TreeNode>) -> CoreResult<()> {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        if !current.is_empty() {
            return Err(CoreError::import("the page tree is not empty"));
        }

        let mut nodes = nodes;
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        let mut next = TreeSnapshot::empty(self.width);
        let mut ids = HashSet::new();
        for node in nodes {
            let bad = |reason: &str| CoreError::import(format!("page {}: {reason}", node.id));
            validate_slug(&node.slug)?;
            if !path::is_valid_path(&node.path, self.width) {
                return Err(bad("path does not match the segment width"));
            }
            if node.depth != node.path.len() / self.width {
                return Err(bad("depth does not match the path"));
            }
            if !ids.insert(node.id) || next.by_path(&node.path).is_some() {
                return Err(bad("duplicate id or path"));
            }
            let parent = path::parent_path(&node.path, self.width)
                .and_then(|parent_path| next.by_path(parent_path))
                .map(|p| p.id);
            if parent != node.parent_id {
                return Err(bad("parent does not match the path"));
            }
            if next.child_by_slug(node.parent_id, &node.slug).is_some() {
                return Err(CoreError::SlugConflict { slug: node.slug });
            }
            next.insert(node);
        }

        debug!(nodes = next.len(), "page tree restored");
        self.publish(next);
        Ok(())
    }

    /// Look up a node, failing with `NotFound`.
    pub fn node(&self, id: Uuid) -> CoreResult<TreeNode> {
        self.snapshot().node(id).cloned()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.snapshot().contains(id)
    }

    pub fn roots(&self) -> Vec<TreeNode> {
        self.snapshot().roots().into_iter().cloned().collect()
    }

    pub fn children(&self, id: Uuid) -> CoreResult<Vec<TreeNode>> {
        Ok(self.snapshot().children(id)?.into_iter().cloned().collect())
    }

    pub fn descendants(&self, id: Uuid) -> CoreResult<Vec<TreeNode>> {
        Ok(self.snapshot().descendants(id)?.into_iter().cloned().collect())
    }

    /// Ancestors from the root down to the parent.
    pub fn ancestors(&self, id: Uuid) -> CoreResult<Vec<TreeNode>> {
        Ok(self.snapshot().ancestors(id)?.into_iter().cloned().collect())
    }

    pub fn siblings(&self, id: Uuid) -> CoreResult<Vec<TreeNode>> {
        Ok(self.snapshot().siblings(id)?.into_iter().cloned().collect())
    }

    pub fn parent(&self, id: Uuid) -> CoreResult<Option<TreeNode>> {
        Ok(self.snapshot().parent(id)?.cloned())
    }

    /// Follow a chain of slugs from the roots down.
    pub fn resolve<S: AsRef<str>>(&self, slugs: &[S]) -> Option<TreeNode> {
        self.snapshot().resolve(slugs).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn slugs(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.slug.as_str()).collect()
    }

    #[test]
    fn paths_follow_creation_order() {
        let tree = TreeStore::new();
        let home = tree.create_node(None, "home", "home").unwrap();
        let about = tree.create_node(Some(home.id), "about", "legal").unwrap();
        let blog = tree.create_node(Some(home.id), "blog", "blog_index").unwrap();

        assert_eq!(home.path, "0001");
        assert_eq!(about.path, "00010001");
        assert_eq!(blog.path, "00010002");
        assert_eq!(blog.depth, 2);
        assert_eq!(slugs(&tree.children(home.id).unwrap()), ["about", "blog"]);
    }

    #[test]
    fn slug_conflict_is_per_parent() {
        let tree = TreeStore::new();
        let a = tree.create_node(None, "a", "home").unwrap();
        let b = tree.create_node(None, "b", "home").unwrap();
        tree.create_node(Some(a.id), "news", "blog").unwrap();
        tree.create_node(Some(b.id), "news", "blog").unwrap();

        let err = tree.create_node(Some(a.id), "news", "blog").unwrap_err();
        assert!(matches!(err, CoreError::SlugConflict { ref slug } if slug == "news"));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn rejects_invalid_slug() {
        let tree = TreeStore::new();
        assert!(matches!(
            tree.create_node(None, "Not OK", "home"),
            Err(CoreError::InvalidSlug { .. })
        ));
    }

    #[test]
    fn deleted_segments_leave_gaps() {
        let tree = TreeStore::new();
        let root = tree.create_node(None, "root", "home").unwrap();
        let a = tree.create_node(Some(root.id), "a", "blog").unwrap();
        let b = tree.create_node(Some(root.id), "b", "blog").unwrap();
        tree.delete_node(a.id, false).unwrap();
        let c = tree.create_node(Some(root.id), "c", "blog").unwrap();
        assert!(c.path > b.path);
    }

    #[test]
    fn exhausted_parent() {
        let tree = TreeStore::with_segment_width(1);
        let root = tree.create_node(None, "root", "home").unwrap();
        for i in 0..35 {
            tree.create_node(Some(root.id), &format!("p{i}"), "blog")
                .unwrap();
        }
        let err = tree.create_node(Some(root.id), "last", "blog").unwrap_err();
        assert!(matches!(err, CoreError::PathExhausted { ref parent_path } if parent_path == "1"));
    }

    #[test]
    fn queries() {
        let tree = TreeStore::new();
        let home = tree.create_node(None, "home", "home").unwrap();
        let blog = tree.create_node(Some(home.id), "blog", "blog_index").unwrap();
        let post = tree.create_node(Some(blog.id), "hello", "blog").unwrap();
        let about = tree.create_node(Some(home.id), "about", "legal").unwrap();

        assert_eq!(
            slugs(&tree.descendants(home.id).unwrap()),
            ["blog", "hello", "about"]
        );
        assert_eq!(slugs(&tree.ancestors(post.id).unwrap()), ["home", "blog"]);
        assert_eq!(slugs(&tree.siblings(blog.id).unwrap()), ["about"]);
        assert_eq!(tree.parent(post.id).unwrap().unwrap().id, blog.id);
        assert!(tree.parent(home.id).unwrap().is_none());
        assert_eq!(tree.resolve(&["home", "blog", "hello"]).unwrap().id, post.id);
        assert!(tree.resolve(&["home", "missing"]).is_none());
        assert_eq!(slugs(&tree.roots()), ["home"]);
        assert!(tree.children(about.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_node_is_not_found() {
        let tree = TreeStore::new();
        assert!(matches!(
            tree.children(Uuid::now_v7()),
            Err(CoreError::NotFound { entity: "page", .. })
        ));
    }

    #[test]
    fn move_rewrites_subtree() {
        let tree = TreeStore::new();
        let home = tree.create_node(None, "home", "home").unwrap();
        let blog = tree.create_node(Some(home.id), "blog", "blog_index").unwrap();
        let post = tree.create_node(Some(blog.id), "post", "blog").unwrap();
        let archive = tree.create_node(None, "archive", "home").unwrap();

        let moved = tree.move_node(blog.id, Some(archive.id), Some("old-blog")).unwrap();
        assert_eq!(moved.path, "00020001");
        assert_eq!(moved.slug, "old-blog");
        assert_eq!(moved.parent_id, Some(archive.id));

        let post = tree.node(post.id).unwrap();
        assert_eq!(post.path, "000200010001");
        assert_eq!(post.depth, 3);
        assert!(tree.children(home.id).unwrap().is_empty());
        assert_eq!(
            tree.resolve(&["archive", "old-blog", "post"]).unwrap().id,
            post.id
        );
    }

    #[test]
    fn move_into_own_subtree_is_refused() {
        let tree = TreeStore::new();
        let a = tree.create_node(None, "a", "home").unwrap();
        let b = tree.create_node(Some(a.id), "b", "home").unwrap();
        let before = tree.snapshot();

        for dest in [a.id, b.id] {
            let err = tree.move_node(a.id, Some(dest), None).unwrap_err();
            assert!(matches!(err, CoreError::CyclicMove { .. }));
        }
        assert!(Arc::ptr_eq(&before, &tree.snapshot()));
    }

    #[test]
    fn move_to_root_with_conflicting_slug_is_refused() {
        let tree = TreeStore::new();
        let a = tree.create_node(None, "a", "home").unwrap();
        let nested = tree.create_node(Some(a.id), "a", "home").unwrap();
        let err = tree.move_node(nested.id, None, None).unwrap_err();
        assert!(matches!(err, CoreError::SlugConflict { .. }));
        assert_eq!(tree.node(nested.id).unwrap().parent_id, Some(a.id));
    }

    #[test]
    fn move_within_parent_reorders_to_end() {
        let tree = TreeStore::new();
        let root = tree.create_node(None, "root", "home").unwrap();
        let first = tree.create_node(Some(root.id), "first", "blog").unwrap();
        tree.create_node(Some(root.id), "second", "blog").unwrap();
        tree.move_node(first.id, Some(root.id), None).unwrap();
        assert_eq!(slugs(&tree.children(root.id).unwrap()), ["second", "first"]);
    }

    #[test]
    fn delete_without_cascade_refuses_non_empty_subtree() {
        let tree = TreeStore::new();
        let a = tree.create_node(None, "a", "home").unwrap();
        tree.create_node(Some(a.id), "b", "home").unwrap();
        let err = tree.delete_node(a.id, false).unwrap_err();
        assert!(matches!(err, CoreError::NonEmptySubtree { descendants: 1, .. }));

        let removed = tree.delete_node(a.id, true).unwrap();
        assert_eq!(slugs(&removed), ["a", "b"]);
        assert!(tree.is_empty());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_writes() {
        let tree = TreeStore::new();
        let a = tree.create_node(None, "a", "home").unwrap();
        let before = tree.snapshot();
        tree.create_node(Some(a.id), "b", "home").unwrap();
        assert!(before.children(a.id).unwrap().is_empty());
        assert_eq!(tree.children(a.id).unwrap().len(), 1);
    }

    #[test]
    fn restore_checks_consistency() {
        let source = TreeStore::new();
        let a = source.create_node(None, "a", "home").unwrap();
        source.create_node(Some(a.id), "b", "home").unwrap();
        let nodes: Vec<TreeNode> = source.snapshot().iter().cloned().collect();

        let copy = TreeStore::new();
        copy.restore(nodes.clone()).unwrap();
        assert_eq!(copy.resolve(&["a", "b"]).unwrap().path, "00010001");
        assert!(matches!(copy.restore(nodes.clone()), Err(CoreError::Import { .. })));

        let mut orphan = nodes;
        orphan.remove(0);
        assert!(matches!(
            TreeStore::new().restore(orphan),
            Err(CoreError::Import { .. })
        ));
    }
}
