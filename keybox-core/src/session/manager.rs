//! SessionManager coordinating sessions across roots
//!
//! SessionManager owns the namespace tree and creates one ConnectionSession
//! per root on first use. Operations on one root are serialized by that
//! session's lock; different roots proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::SessionTimeouts;
use super::state::{ConnectionSession, SessionContext, SessionStatus};
use super::tasks::OpCompletion;
use crate::error::{KeyboxError, RegistryError, SessionError};
use crate::events::{BrowserEvent, EventBus};
use crate::roots::{RootConfig, RootRepository};
use crate::store::StoreConnector;
use crate::tree::{NamespaceTree, NodeId, NodeKind, RootStatus, TreeError};

/// Result of opening a node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpenOutcome {
    /// An unconnected root was connected
    Connected { root: String, keys: usize },
    /// A keyed node's value was fetched
    Value {
        root: String,
        key: String,
        value: Vec<u8>,
    },
    /// The node has nothing to open
    Nothing,
}

#[derive(Clone)]
struct SessionSlot {
    session: Arc<Mutex<ConnectionSession>>,
    status: Arc<RwLock<SessionStatus>>,
}

/// Coordinates connection sessions for every configured root
pub struct SessionManager {
    registry: Arc<RootRepository>,
    ctx: SessionContext,
    sessions: RwLock<HashMap<String, SessionSlot>>,
    /// In-flight connect attempts, at most one per root
    attempts: StdMutex<HashMap<String, (Uuid, CancellationToken)>>,
    completion_tx: mpsc::UnboundedSender<OpCompletion>,
    completion_rx: StdMutex<Option<mpsc::UnboundedReceiver<OpCompletion>>>,
}

impl SessionManager {
    /// Create a manager with a tree holding every root in `registry`
    pub async fn new(
        registry: Arc<RootRepository>,
        connector: Arc<dyn StoreConnector>,
        event_bus: Arc<dyn EventBus>,
        timeouts: SessionTimeouts,
    ) -> Self {
        let tree = NamespaceTree::with_roots(registry.names().await);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            ctx: SessionContext {
                tree: Arc::new(RwLock::new(tree)),
                event_bus,
                connector,
                timeouts,
            },
            sessions: RwLock::new(HashMap::new()),
            attempts: StdMutex::new(HashMap::new()),
            completion_tx,
            completion_rx: StdMutex::new(Some(completion_rx)),
        }
    }

    /// Shared handle to the namespace tree
    pub fn tree(&self) -> Arc<RwLock<NamespaceTree>> {
        Arc::clone(&self.ctx.tree)
    }

    pub fn event_bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.ctx.event_bus)
    }

    pub fn registry(&self) -> &Arc<RootRepository> {
        &self.registry
    }

    pub fn timeouts(&self) -> SessionTimeouts {
        self.ctx.timeouts
    }

    /// Take the receiver for background operation completions
    ///
    /// Returns `None` after the first call.
    pub fn take_completions(&self) -> Option<mpsc::UnboundedReceiver<OpCompletion>> {
        lock(&self.completion_rx).take()
    }

    /// Current status of `root`; roots never connected are Disconnected
    pub async fn status(&self, root: &str) -> SessionStatus {
        let slot = self.sessions.read().await.get(root).cloned();
        match slot {
            Some(slot) => *slot.status.read().await,
            None => SessionStatus::Disconnected,
        }
    }

    /// Status of every configured root, in registry order
    pub async fn statuses(&self) -> Vec<(String, SessionStatus)> {
        let mut statuses = Vec::new();
        for name in self.registry.names().await {
            let status = self.status(&name).await;
            statuses.push((name, status));
        }
        statuses
    }

    // ==================== Session operations ====================

    /// Connect `root`, listing its namespace into the tree
    ///
    /// Fails with [`SessionError::Busy`] while another connect or search on
    /// the same root is in flight.
    pub async fn connect(&self, root: &str) -> Result<usize, SessionError> {
        let (attempt, cancel) = self.register_attempt(root)?;
        let result = self.connect_attempt(root, &cancel).await;
        self.clear_attempt(root, attempt);
        result
    }

    /// Fire the cancellation token of the in-flight connect on `root`
    ///
    /// Returns whether an attempt was in flight.
    pub fn cancel_connect(&self, root: &str) -> bool {
        match lock(&self.attempts).get(root) {
            Some((attempt, cancel)) => {
                info!(root = %root, attempt = %attempt, "Cancelling connect");
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Close the session on `root` and drop its subtree
    ///
    /// Waits for an in-flight operation on the same root to finish.
    pub async fn disconnect(&self, root: &str) -> Result<(), SessionError> {
        let slot = self.slot(root).await?;
        let mut session = slot.session.lock().await;
        session.disconnect().await
    }

    /// Disconnect then connect; Disconnected is observable in between
    pub async fn reconnect(&self, root: &str) -> Result<usize, SessionError> {
        self.disconnect(root).await?;
        self.connect(root).await
    }

    /// Rebuild the subtree of `root` from the keys under `prefix`
    pub async fn search(&self, root: &str, prefix: &str) -> Result<usize, SessionError> {
        let slot = self.slot(root).await?;
        let mut session = slot
            .session
            .try_lock()
            .map_err(|_| SessionError::Busy(root.to_string()))?;
        session.search(prefix).await
    }

    /// Fetch the value of `key` through the session on `root`
    pub async fn get_value(&self, root: &str, key: &str) -> Result<Vec<u8>, SessionError> {
        let slot = self.slot(root).await?;
        let session = slot.session.lock().await;
        session.get_value(key).await
    }

    /// Open a node: connect an unconnected root, or fetch a keyed node's value
    pub async fn open(&self, node: NodeId) -> Result<OpenOutcome, SessionError> {
        let (root, kind, key) = {
            let tree = self.ctx.tree.read().await;
            let entry = tree.get(node).ok_or(TreeError::StaleNode(node))?;
            (
                entry.root_name().to_string(),
                entry.kind(),
                entry.full_key().map(str::to_string),
            )
        };

        match (kind, key) {
            (NodeKind::ConnectionRoot(RootStatus::Unconnected), _) => {
                let keys = self.connect(&root).await?;
                Ok(OpenOutcome::Connected { root, keys })
            }
            (NodeKind::Directory | NodeKind::Leaf, Some(key)) => {
                let value = self.get_value(&root, &key).await?;
                Ok(OpenOutcome::Value { root, key, value })
            }
            _ => Ok(OpenOutcome::Nothing),
        }
    }

    // ==================== Registry ====================

    /// Register and persist a new root, inserting it into the tree
    pub async fn add_root(&self, root: RootConfig) -> Result<NodeId, RegistryError> {
        let name = root.name.clone();
        self.registry.add(root).await?;

        let node = self.ctx.tree.write().await.add_connection_root(&name);
        self.ctx
            .event_bus
            .publish(BrowserEvent::ItemInserted {
                root: name.clone(),
                node,
            })
            .await;

        debug!(root = %name, node = %node, "Root inserted");
        Ok(node)
    }

    /// Forget a root: persist the removal, disconnect, drop its node
    pub async fn remove_root(&self, name: &str) -> Result<(), KeyboxError> {
        self.registry.remove(name).await?;

        self.cancel_connect(name);
        let slot = self.sessions.write().await.remove(name);
        if let Some(slot) = slot {
            slot.session.lock().await.disconnect().await?;
        }

        let removed = self.ctx.tree.write().await.remove_connection_root(name);
        if let Some(node) = removed {
            self.ctx
                .event_bus
                .publish(BrowserEvent::ItemRemoved {
                    root: name.to_string(),
                    node,
                })
                .await;
        }
        Ok(())
    }

    /// Cancel pending connects and close every session
    pub async fn shutdown(&self) {
        let pending: Vec<CancellationToken> = lock(&self.attempts)
            .values()
            .map(|(_, cancel)| cancel.clone())
            .collect();
        for cancel in pending {
            cancel.cancel();
        }

        let slots: Vec<(String, SessionSlot)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect();
        for (name, slot) in slots {
            if let Err(e) = slot.session.lock().await.disconnect().await {
                warn!(root = %name, error = %e, "Failed to close session");
            }
        }
    }

    // ==================== Internals ====================

    /// Session slot for `root`, created on first use
    async fn slot(&self, root: &str) -> Result<SessionSlot, SessionError> {
        if let Some(slot) = self.sessions.read().await.get(root) {
            return Ok(slot.clone());
        }

        let config = self
            .registry
            .get(root)
            .await
            .ok_or_else(|| SessionError::NotFound(root.to_string()))?;

        let mut sessions = self.sessions.write().await;
        let slot = sessions.entry(root.to_string()).or_insert_with(|| {
            let session = ConnectionSession::new(config, self.ctx.clone());
            SessionSlot {
                status: session.status_handle(),
                session: Arc::new(Mutex::new(session)),
            }
        });
        Ok(slot.clone())
    }

    pub(super) fn register_attempt(
        &self,
        root: &str,
    ) -> Result<(Uuid, CancellationToken), SessionError> {
        let mut attempts = lock(&self.attempts);
        if attempts.contains_key(root) {
            return Err(SessionError::Busy(root.to_string()));
        }
        let attempt = Uuid::new_v4();
        let cancel = CancellationToken::new();
        attempts.insert(root.to_string(), (attempt, cancel.clone()));
        Ok((attempt, cancel))
    }

    pub(super) fn clear_attempt(&self, root: &str, attempt: Uuid) {
        let mut attempts = lock(&self.attempts);
        if attempts.get(root).is_some_and(|(id, _)| *id == attempt) {
            attempts.remove(root);
        }
    }

    pub(super) async fn connect_attempt(
        &self,
        root: &str,
        cancel: &CancellationToken,
    ) -> Result<usize, SessionError> {
        let slot = self.slot(root).await?;
        let mut session = slot
            .session
            .try_lock()
            .map_err(|_| SessionError::Busy(root.to_string()))?;
        session.connect(cancel).await
    }

    pub(super) fn completion_sender(&self) -> mpsc::UnboundedSender<OpCompletion> {
        self.completion_tx.clone()
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
