//! Hierarchical view of a flat key namespace
//!
//! [`NamespaceTree`] turns slash-delimited store keys into directory and
//! leaf nodes under one synthetic root. Each configured store gets a
//! connection-root node whose subtree is rebuilt wholesale by its session.

pub mod namespace;
pub mod node;

pub use namespace::{BuildStats, EMPTY_SEGMENT_LABEL, NamespaceTree, ROOT_LABEL, TreeError};
pub use node::{NamespaceNode, NodeAction, NodeId, NodeKind, RootStatus};
