//! keybox-core: Core library for the keybox key-value browser
//!
//! This crate provides the foundational components for keybox:
//!
//! - **Namespace tree** - [`NamespaceTree`] turning slash-delimited keys into a navigable hierarchy
//! - **Sessions** - [`ConnectionSession`] and [`SessionManager`] for connecting, searching and disconnecting roots
//! - **Roots registry** - [`RootRepository`] for the persisted set of named stores
//! - **Store clients** - [`StoreConnector`] with [`EtcdConnector`] and [`MockConnector`] implementations
//! - **Event system** - [`EventBus`] trait and [`MemoryEventBus`] carrying tree mutation notifications
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keybox_core::{
//!     EtcdConnector, JsonRootStore, MemoryEventBus, RootRepository, SessionManager,
//!     SessionTimeouts,
//! };
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = RootRepository::load(Arc::new(JsonRootStore::new("roots.json"))).await?;
//!     let manager = SessionManager::new(
//!         Arc::new(registry),
//!         Arc::new(EtcdConnector::new()),
//!         Arc::new(MemoryEventBus::new(1000)),
//!         SessionTimeouts::default(),
//!     )
//!     .await;
//!
//!     let keys = manager.connect("local").await?;
//!     println!("Listed {} keys", keys);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 SessionManager                    │
//! │  ┌──────────────────┐   ┌──────────────────────┐ │
//! │  │ ConnectionSession │──▶│    NamespaceTree     │ │
//! │  │  (one per root)   │   │ All / root / dir ... │ │
//! │  └────────┬─────────┘   └──────────────────────┘ │
//! │           │ StoreClient          │ BrowserEvent   │
//! │           ▼                      ▼                │
//! │     etcd / mock             EventBus              │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod events;
pub mod roots;
pub mod session;
pub mod store;
pub mod tree;

// Re-export key types for convenience
pub use error::{
    ConfigError, ConnectionError, KeyboxError, QueryError, RegistryError, SessionError, StoreError,
};
pub use events::{BrowserEvent, EventBus, EventSeq, MemoryEventBus};
pub use roots::{Credentials, JsonRootStore, MemoryRootStore, RootConfig, RootRepository, RootStore};
pub use session::{
    ConnectionSession, OpCompletion, OpenOutcome, SessionManager, SessionOp, SessionStatus,
    SessionTimeouts,
};
pub use store::{EtcdConnector, MockConnector, MockFailure, MockStore, StoreClient, StoreConnector};
pub use tree::{NamespaceTree, NodeAction, NodeId, NodeKind, RootStatus, TreeError};
