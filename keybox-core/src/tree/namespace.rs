//! Arena-backed namespace tree
//!
//! Nodes live in a slot vector and refer to each other by [`NodeId`].
//! Parents own their children through the label index; the `parent` field is
//! only a back-reference used for navigation.

use thiserror::Error;
use tracing::{debug, warn};

use super::node::{NamespaceNode, NodeAction, NodeId, NodeKind, Role, RootStatus};

/// Label of the synthetic root node
pub const ROOT_LABEL: &str = "All";

/// Key path separator
const SEPARATOR: char = '/';

/// Label shown for an empty path segment, as in `/a/` or `/b//c`
///
/// Split segments never contain the separator, so this cannot collide with
/// a real label.
pub const EMPTY_SEGMENT_LABEL: &str = "/";

/// Errors from tree operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Node {0} no longer exists")]
    StaleNode(NodeId),

    #[error("Node {0} is not a connection root")]
    NotConnectionRoot(NodeId),
}

/// Counters reported by [`NamespaceTree::build_subtree`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Keys consumed from the input
    pub keys: usize,
    /// Nodes newly allocated
    pub created: usize,
    /// Keys that landed on a node already carrying a key
    pub duplicates: usize,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<NamespaceNode>,
}

/// Tree of connection roots and the keys listed under them
#[derive(Debug)]
pub struct NamespaceTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTree {
    /// Create a tree holding only the synthetic root
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        tree.root = tree.alloc(NamespaceNode::new(ROOT_LABEL, "", None, Role::Root));
        tree
    }

    /// Create a tree with one unconnected placeholder per root name
    pub fn with_roots<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for name in names {
            tree.add_connection_root(name.as_ref());
        }
        tree
    }

    // ==================== Query surface ====================

    /// Number of top-level roots (always one: the synthetic root)
    pub fn root_count(&self) -> usize {
        1
    }

    pub fn root_at(&self, index: usize) -> Option<NodeId> {
        (index == 0).then_some(self.root)
    }

    /// The synthetic root
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Resolve an id, `None` if it has gone stale
    pub fn get(&self, id: NodeId) -> Option<&NamespaceNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.get(id).map(NamespaceNode::child_count).unwrap_or(0)
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.get(id)?
            .children
            .get_index(index)
            .map(|(_, child)| *child)
    }

    pub fn child_by_label(&self, id: NodeId, label: &str) -> Option<NodeId> {
        self.get(id)?.children.get(label).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(NamespaceNode::label)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(NamespaceNode::kind)
    }

    pub fn available_actions(&self, id: NodeId) -> Vec<NodeAction> {
        self.get(id)
            .map(NamespaceNode::available_actions)
            .unwrap_or_default()
    }

    /// Resolve a slash-delimited label path below `from`
    pub fn find_path(&self, from: NodeId, path: &str) -> Option<NodeId> {
        split_key(path)
            .into_iter()
            .try_fold(from, |node, label| self.child_by_label(node, label))
    }

    /// All descendants of `id` in pre-order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.get(id) {
            Some(node) => node.children().collect(),
            None => return out,
        };
        stack.reverse();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                let mut children: Vec<NodeId> = node.children().collect();
                children.reverse();
                stack.extend(children);
            }
        }
        out
    }

    /// Full keys carried by nodes under `id`, in display order
    pub fn keys_under(&self, id: NodeId) -> Vec<String> {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.get(n)?.full_key.clone())
            .collect()
    }

    pub fn leaf_count(&self, id: NodeId) -> usize {
        self.count_kind(id, NodeKind::Leaf)
    }

    pub fn directory_count(&self, id: NodeId) -> usize {
        self.count_kind(id, NodeKind::Directory)
    }

    fn count_kind(&self, id: NodeId, kind: NodeKind) -> usize {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.kind(*n) == Some(kind))
            .count()
    }

    // ==================== Connection roots ====================

    /// Look up the placeholder node for a root
    pub fn connection_root(&self, name: &str) -> Option<NodeId> {
        self.child_by_label(self.root, name)
    }

    /// Names of all connection roots in display order
    pub fn connection_root_names(&self) -> Vec<String> {
        self.get(self.root)
            .map(|root| root.children.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Add an unconnected placeholder for a root, returning the existing
    /// node if one with this name is already present
    pub fn add_connection_root(&mut self, name: &str) -> NodeId {
        if let Some(existing) = self.connection_root(name) {
            return existing;
        }
        let root = self.root;
        let id = self.alloc(NamespaceNode::new(
            name,
            name,
            Some(root),
            Role::ConnectionRoot(RootStatus::Unconnected),
        ));
        if let Some(node) = self.node_mut(root) {
            node.children.insert(name.to_string(), id);
        }
        id
    }

    /// Remove a root placeholder and everything below it
    pub fn remove_connection_root(&mut self, name: &str) -> Option<NodeId> {
        let id = self.connection_root(name)?;
        let root = self.root;
        if let Some(node) = self.node_mut(root) {
            node.children.shift_remove(name);
        }
        for descendant in self.descendants(id) {
            self.release(descendant);
        }
        self.release(id);
        Some(id)
    }

    pub fn root_status(&self, id: NodeId) -> Option<RootStatus> {
        match self.get(id)?.role {
            Role::ConnectionRoot(status) => Some(status),
            _ => None,
        }
    }

    pub fn set_root_status(&mut self, id: NodeId, status: RootStatus) -> Result<(), TreeError> {
        let node = self.node_mut(id).ok_or(TreeError::StaleNode(id))?;
        match node.role {
            Role::ConnectionRoot(_) => {
                node.role = Role::ConnectionRoot(status);
                Ok(())
            }
            _ => Err(TreeError::NotConnectionRoot(id)),
        }
    }

    // ==================== Rebuild ====================

    /// Discard every descendant of `id`
    ///
    /// Ids pointing into the discarded subtree become stale. Returns the
    /// number of nodes released.
    pub fn reset_subtree(&mut self, id: NodeId) -> Result<usize, TreeError> {
        if !self.contains(id) {
            return Err(TreeError::StaleNode(id));
        }
        let doomed = self.descendants(id);
        for node in &doomed {
            self.release(*node);
        }
        if let Some(node) = self.node_mut(id) {
            node.children.clear();
        }
        Ok(doomed.len())
    }

    /// Insert `keys` below `id`, creating directories on the way
    ///
    /// Insertion is idempotent: an existing child with the same label is
    /// reused, so feeding the same key twice creates nothing new. Siblings
    /// keep first-seen order.
    pub fn build_subtree<I, S>(&mut self, id: NodeId, keys: I) -> Result<BuildStats, TreeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root_name = self
            .get(id)
            .ok_or(TreeError::StaleNode(id))?
            .root_name
            .clone();
        let mut stats = BuildStats::default();

        for key in keys {
            let key = key.as_ref();
            if key.is_empty() {
                continue;
            }
            stats.keys += 1;

            let mut current = id;
            for label in split_key(key) {
                current = match self.child_by_label(current, label) {
                    Some(child) => child,
                    None => {
                        stats.created += 1;
                        self.insert_child(current, label, &root_name)
                    }
                };
            }

            if let Some(node) = self.node_mut(current) {
                if node.full_key.is_none() {
                    node.full_key = Some(key.to_string());
                } else {
                    stats.duplicates += 1;
                    if let Some(existing) = node.full_key.as_deref()
                        && existing != key
                    {
                        warn!(existing = %existing, key = %key, "Keys collapse onto the same node");
                    }
                }
            }
        }

        debug!(
            root = %root_name,
            keys = stats.keys,
            created = stats.created,
            duplicates = stats.duplicates,
            "Subtree built"
        );
        Ok(stats)
    }

    // ==================== Arena ====================

    fn insert_child(&mut self, parent: NodeId, label: &str, root_name: &str) -> NodeId {
        let id = self.alloc(NamespaceNode::new(
            label,
            root_name,
            Some(parent),
            Role::Entry,
        ));
        if let Some(node) = self.node_mut(parent) {
            node.children.insert(label.to_string(), id);
        }
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NamespaceNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn alloc(&mut self, node: NamespaceNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize)
            && slot.generation == id.generation
            && slot.node.take().is_some()
        {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }
}

/// Strip one leading separator and split into labels
///
/// Empty segments are kept so that `/a` and `/a/` stay distinct.
fn split_key(key: &str) -> Vec<&str> {
    key.strip_prefix(SEPARATOR)
        .unwrap_or(key)
        .split(SEPARATOR)
        .map(|segment| {
            if segment.is_empty() {
                EMPTY_SEGMENT_LABEL
            } else {
                segment
            }
        })
        .collect()
}
