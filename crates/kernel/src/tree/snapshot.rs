//! Immutable tree snapshots and their structural queries.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::path::{self, PATH_UPPER_BOUND};
use crate::error::{CoreError, CoreResult};

/// A node of the page tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: Uuid,
    /// Ancestor segments followed by this node's own segment.
    pub path: String,
    /// Number of segments in `path`; roots have depth 1.
    pub depth: usize,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub type_tag: String,
}

impl TreeNode {
    /// Whether `other` lies strictly below this node.
    pub fn is_ancestor_of(&self, other: &TreeNode) -> bool {
        other.path.len() > self.path.len() && other.path.starts_with(&self.path)
    }
}

/// A consistent view of the whole tree.
///
/// Snapshots are never modified once published; every structural mutation
/// builds a new one. Queries on a snapshot need no locks and always see a
/// single point in time.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    width: usize,
    by_path: BTreeMap<String, Uuid>,
    nodes: HashMap<Uuid, TreeNode>,
}

impl TreeSnapshot {
    pub(crate) fn empty(width: usize) -> Self {
        Self {
            width,
            by_path: BTreeMap::new(),
            nodes: HashMap::new(),
        }
    }

    /// Segment width of every path in this tree.
    pub fn segment_width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    /// Look up a node, failing with `NotFound`.
    pub fn node(&self, id: Uuid) -> CoreResult<&TreeNode> {
        self.get(id).ok_or_else(|| CoreError::page_not_found(id))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn by_path(&self, path: &str) -> Option<&TreeNode> {
        self.by_path.get(path).and_then(|id| self.nodes.get(id))
    }

    /// All nodes in path order (pre-order, siblings in order).
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.by_path.values().filter_map(|id| self.nodes.get(id))
    }

    /// Root nodes in sibling order.
    pub fn roots(&self) -> Vec<&TreeNode> {
        self.children_of_path("")
    }

    /// Direct children in sibling order.
    pub fn children(&self, id: Uuid) -> CoreResult<Vec<&TreeNode>> {
        let node = self.node(id)?;
        Ok(self.children_of_path(&node.path))
    }

    /// Every node below `id`, in path order.
    pub fn descendants(&self, id: Uuid) -> CoreResult<Vec<&TreeNode>> {
        let node = self.node(id)?;
        Ok(self
            .subtree_range(&node.path)
            .filter(|n| n.id != id)
            .collect())
    }

    /// Number of nodes below `id`.
    pub fn descendant_count(&self, id: Uuid) -> CoreResult<usize> {
        let node = self.node(id)?;
        Ok(self.subtree_range(&node.path).count().saturating_sub(1))
    }

    /// Ancestors from the root down to the parent.
    pub fn ancestors(&self, id: Uuid) -> CoreResult<Vec<&TreeNode>> {
        let node = self.node(id)?;
        let width = self.width;
        Ok((1..node.depth)
            .filter_map(|depth| self.by_path(&node.path[..depth * width]))
            .collect())
    }

    /// The other children of the same parent, in sibling order.
    pub fn siblings(&self, id: Uuid) -> CoreResult<Vec<&TreeNode>> {
        let node = self.node(id)?;
        let parent = path::parent_path(&node.path, self.width).unwrap_or("");
        Ok(self
            .children_of_path(parent)
            .into_iter()
            .filter(|n| n.id != id)
            .collect())
    }

    pub fn parent(&self, id: Uuid) -> CoreResult<Option<&TreeNode>> {
        let node = self.node(id)?;
        Ok(node.parent_id.and_then(|parent| self.get(parent)))
    }

    /// The child of `parent` (or the root, for `None`) with this slug.
    pub fn child_by_slug(&self, parent: Option<Uuid>, slug: &str) -> Option<&TreeNode> {
        let prefix = match parent {
            Some(id) => self.get(id)?.path.as_str(),
            None => "",
        };
        self.children_of_path(prefix)
            .into_iter()
            .find(|n| n.slug == slug)
    }

    /// Follow a chain of slugs from the roots down.
    pub fn resolve<S: AsRef<str>>(&self, slugs: &[S]) -> Option<&TreeNode> {
        let (first, rest) = slugs.split_first()?;
        let mut node = self.child_by_slug(None, first.as_ref())?;
        for slug in rest {
            node = self.child_by_slug(Some(node.id), slug.as_ref())?;
        }
        Some(node)
    }

    /// Nodes whose path starts with `prefix`, including the node at
    /// `prefix` itself.
    pub(crate) fn subtree_range<'a>(
        &'a self,
        prefix: &str,
    ) -> impl Iterator<Item = &'a TreeNode> + use<'a> {
        let upper = format!("{prefix}{PATH_UPPER_BOUND}");
        self.by_path
            .range::<String, _>((Bound::Included(prefix.to_string()), Bound::Excluded(upper)))
            .filter_map(|(_, id)| self.nodes.get(id))
    }

    /// Children of the node at `prefix`, skipping over each child's subtree
    /// rather than scanning it.
    fn children_of_path(&self, prefix: &str) -> Vec<&TreeNode> {
        let upper = format!("{prefix}{PATH_UPPER_BOUND}");
        let mut children = Vec::new();
        let mut lower = Bound::Excluded(prefix.to_string());
        loop {
            let next = self
                .by_path
                .range::<str, _>((
                    lower.as_ref().map(String::as_str),
                    Bound::Excluded(upper.as_str()),
                ))
                .next();
            let Some((child_path, id)) = next else {
                break;
            };
            if let Some(node) = self.nodes.get(id) {
                children.push(node);
            }
            lower = Bound::Included(format!("{child_path}{PATH_UPPER_BOUND}"));
        }
        children
    }

    /// Highest segment value in use under the node at `prefix`.
    pub(crate) fn max_child_segment(&self, prefix: &str) -> Option<u64> {
        self.children_of_path(prefix)
            .last()
            .and_then(|n| path::decode_segment(path::last_segment(&n.path, self.width)))
    }

    pub(crate) fn insert(&mut self, node: TreeNode) {
        self.by_path.insert(node.path.clone(), node.id);
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn remove(&mut self, id: Uuid) -> Option<TreeNode> {
        let node = self.nodes.remove(&id)?;
        self.by_path.remove(&node.path);
        Some(node)
    }
}
