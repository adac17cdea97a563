//! Node types for the namespace tree

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Handle to a node in a [`NamespaceTree`](super::NamespaceTree)
///
/// Ids carry a generation. Once a subtree is reset, ids that pointed into it
/// stop resolving instead of aliasing whatever node reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Display status of a connection-root node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootStatus {
    /// No session, subtree is empty
    Unconnected,
    /// Subtree shows the full namespace
    Connected,
    /// Subtree shows a prefix-filtered listing
    Searching,
}

/// What a node represents
///
/// Presentation maps this tag to an icon; the core never deals in assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum NodeKind {
    /// The synthetic top of the tree
    Root,
    /// One configured store
    ConnectionRoot(RootStatus),
    /// Intermediate path segment
    Directory,
    /// A store key with no children
    Leaf,
}

/// Actions the presentation layer may offer for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAction {
    Connect,
    Reconnect,
    Disconnect,
    Search,
    Delete,
    ViewValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Root,
    ConnectionRoot(RootStatus),
    Entry,
}

/// A single node of the namespace tree
#[derive(Debug, Clone)]
pub struct NamespaceNode {
    pub(crate) label: String,
    pub(crate) full_key: Option<String>,
    pub(crate) root_name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: IndexMap<String, NodeId>,
    pub(crate) role: Role,
}

impl NamespaceNode {
    pub(crate) fn new(
        label: impl Into<String>,
        root_name: impl Into<String>,
        parent: Option<NodeId>,
        role: Role,
    ) -> Self {
        Self {
            label: label.into(),
            full_key: None,
            root_name: root_name.into(),
            parent,
            children: IndexMap::new(),
            role,
        }
    }

    /// Path segment shown for this node
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Complete store key, `None` for synthetic directories
    pub fn full_key(&self) -> Option<&str> {
        self.full_key.as_deref()
    }

    /// Name of the root whose session owns this node
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Back-reference to the parent node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Children in insertion order
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    pub fn kind(&self) -> NodeKind {
        match self.role {
            Role::Root => NodeKind::Root,
            Role::ConnectionRoot(status) => NodeKind::ConnectionRoot(status),
            Role::Entry if self.full_key.is_some() && self.children.is_empty() => NodeKind::Leaf,
            Role::Entry => NodeKind::Directory,
        }
    }

    /// Actions that make sense for this node in its current state
    pub fn available_actions(&self) -> Vec<NodeAction> {
        match self.role {
            Role::ConnectionRoot(RootStatus::Unconnected) => {
                vec![NodeAction::Connect, NodeAction::Delete]
            }
            Role::ConnectionRoot(_) => vec![
                NodeAction::Reconnect,
                NodeAction::Disconnect,
                NodeAction::Search,
                NodeAction::Delete,
            ],
            Role::Entry if self.full_key.is_some() => vec![NodeAction::ViewValue],
            _ => Vec::new(),
        }
    }
}
