//! Event type definitions

use serde::{Deserialize, Serialize};

use crate::session::SessionStatus;
use crate::tree::NodeId;

/// Events on the browser event bus
///
/// The three `Item*` variants are the only signals of tree mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// A node was added under the synthetic root
    ItemInserted { root: String, node: NodeId },

    /// A node and its subtree were removed
    ItemRemoved { root: String, node: NodeId },

    /// The children of `node` were replaced wholesale
    ItemsReset { root: String, node: NodeId },

    /// A session moved to a new status
    SessionStatusChanged { root: String, status: SessionStatus },
}

impl BrowserEvent {
    /// Name of the root this event concerns
    pub fn root(&self) -> &str {
        match self {
            BrowserEvent::ItemInserted { root, .. } => root,
            BrowserEvent::ItemRemoved { root, .. } => root,
            BrowserEvent::ItemsReset { root, .. } => root,
            BrowserEvent::SessionStatusChanged { root, .. } => root,
        }
    }

    /// Node affected by a tree mutation
    pub fn node(&self) -> Option<NodeId> {
        match self {
            BrowserEvent::ItemInserted { node, .. }
            | BrowserEvent::ItemRemoved { node, .. }
            | BrowserEvent::ItemsReset { node, .. } => Some(*node),
            BrowserEvent::SessionStatusChanged { .. } => None,
        }
    }

    /// Whether this event signals a tree mutation
    pub fn is_tree_mutation(&self) -> bool {
        self.node().is_some()
    }
}
