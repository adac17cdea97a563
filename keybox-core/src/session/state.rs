//! ConnectionSession and its state machine
//!
//! A session owns the store client for one root and is the only writer of
//! that root's subtree. Transitions:
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//! Connecting --error--> Failed --> Disconnected
//! Connected --disconnect--> Disconnected
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{SessionTimeouts, millis};
use crate::error::{ConnectionError, QueryError, SessionError, StoreError};
use crate::events::{BrowserEvent, EventBus};
use crate::roots::RootConfig;
use crate::store::{StoreClient, StoreConnector};
use crate::tree::{BuildStats, NamespaceTree, NodeId, RootStatus, TreeError};

/// Prefix covering the whole store namespace
pub const FULL_NAMESPACE: &str = "/";

/// Status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Transient; a failed session settles in Disconnected
    Failed,
}

/// Shared collaborators every session works against
#[derive(Clone)]
pub struct SessionContext {
    pub tree: Arc<RwLock<NamespaceTree>>,
    pub event_bus: Arc<dyn EventBus>,
    pub connector: Arc<dyn StoreConnector>,
    pub timeouts: SessionTimeouts,
}

/// Runtime connection state for one root
pub struct ConnectionSession {
    root: RootConfig,
    ctx: SessionContext,
    /// Exclusively owned; only this session opens or closes it
    client: Option<Box<dyn StoreClient>>,
    status: Arc<RwLock<SessionStatus>>,
    connected_at: Option<DateTime<Utc>>,
    filter: Option<String>,
    last_error: Option<String>,
}

impl ConnectionSession {
    pub fn new(root: RootConfig, ctx: SessionContext) -> Self {
        Self {
            root,
            ctx,
            client: None,
            status: Arc::new(RwLock::new(SessionStatus::Disconnected)),
            connected_at: None,
            filter: None,
            last_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.root.name
    }

    pub fn root_config(&self) -> &RootConfig {
        &self.root
    }

    /// Handle for reading the status without locking the session
    pub fn status_handle(&self) -> Arc<RwLock<SessionStatus>> {
        Arc::clone(&self.status)
    }

    pub async fn status(&self) -> SessionStatus {
        *self.status.read().await
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    /// Prefix of the active search, if the view is filtered
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Message of the most recent failed connect
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ==================== Operations ====================

    /// Open a client, probe it and list the full namespace into the tree
    ///
    /// Rejected unless the session is Disconnected. If `cancel` fires
    /// before the attempt completes, its results are dropped and the
    /// session fails with [`ConnectionError::Cancelled`]. Returns the number
    /// of keys listed.
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<usize, SessionError> {
        let current = self.status().await;
        if matches!(current, SessionStatus::Connecting | SessionStatus::Connected) {
            return Err(SessionError::InvalidState {
                expected: "Disconnected".to_string(),
                actual: format!("{:?}", current),
            });
        }

        let node = self.node().await?;
        self.last_error = None;
        self.set_status(SessionStatus::Connecting).await;
        info!(root = %self.root.name, endpoint = %self.root.endpoint, "Connecting");

        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnectionError::Cancelled.into()),
            result = establish(&self.ctx, &self.root) => result,
        };

        let (mut client, keys) = match attempt {
            Ok((mut client, _)) if cancel.is_cancelled() => {
                client.close().await;
                return Err(self.fail(ConnectionError::Cancelled.into()).await);
            }
            Ok(established) => established,
            Err(err) => return Err(self.fail(err).await),
        };

        let stats = match self.rebuild(node, &keys, RootStatus::Connected).await {
            Ok(stats) => stats,
            Err(err) => {
                client.close().await;
                return Err(self.fail(err.into()).await);
            }
        };

        self.client = Some(client);
        self.connected_at = Some(Utc::now());
        self.filter = None;
        self.set_status(SessionStatus::Connected).await;
        self.publish_reset(node).await;

        info!(root = %self.root.name, keys = stats.keys, "Connected");
        Ok(stats.keys)
    }

    /// Drop the subtree and close the client
    ///
    /// Idempotent: a disconnected session performs the same steps.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        let node = self.node().await?;
        {
            let mut tree = self.ctx.tree.write().await;
            tree.reset_subtree(node)?;
            tree.set_root_status(node, RootStatus::Unconnected)?;
        }

        if let Some(mut client) = self.client.take() {
            client.close().await;
            info!(root = %self.root.name, "Disconnected");
        }
        self.connected_at = None;
        self.filter = None;
        self.set_status(SessionStatus::Disconnected).await;
        self.publish_reset(node).await;
        Ok(())
    }

    /// Fetch the value stored under `key`
    pub async fn get_value(&self, key: &str) -> Result<Vec<u8>, SessionError> {
        let client = self.connected_client().await?;
        let query_timeout = self.ctx.timeouts.query;

        let value = timeout(query_timeout, client.get(key))
            .await
            .map_err(|_| QueryError::Timeout(millis(query_timeout)))??;

        value.ok_or_else(|| QueryError::KeyNotFound(key.to_string()).into())
    }

    // ==================== Internals ====================

    pub(super) async fn connected_client(&self) -> Result<&dyn StoreClient, SessionError> {
        let current = self.status().await;
        match (&self.client, current) {
            (Some(client), SessionStatus::Connected) => Ok(&**client),
            _ => Err(SessionError::InvalidState {
                expected: "Connected".to_string(),
                actual: format!("{:?}", current),
            }),
        }
    }

    /// Node id of this session's connection root
    pub(super) async fn node(&self) -> Result<NodeId, SessionError> {
        self.ctx
            .tree
            .read()
            .await
            .connection_root(&self.root.name)
            .ok_or_else(|| SessionError::NotFound(self.root.name.clone()))
    }

    /// Replace the subtree under `node` with `keys` and mark its status
    pub(super) async fn rebuild(
        &self,
        node: NodeId,
        keys: &[String],
        status: RootStatus,
    ) -> Result<BuildStats, TreeError> {
        let mut tree = self.ctx.tree.write().await;
        tree.reset_subtree(node)?;
        let stats = tree.build_subtree(node, keys)?;
        tree.set_root_status(node, status)?;
        Ok(stats)
    }

    pub(super) async fn publish_reset(&self, node: NodeId) {
        self.ctx
            .event_bus
            .publish(BrowserEvent::ItemsReset {
                root: self.root.name.clone(),
                node,
            })
            .await;
    }

    pub(super) fn tree(&self) -> &Arc<RwLock<NamespaceTree>> {
        &self.ctx.tree
    }

    pub(super) fn event_bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.ctx.event_bus)
    }

    pub(super) fn timeouts(&self) -> SessionTimeouts {
        self.ctx.timeouts
    }

    pub(super) fn set_filter(&mut self, prefix: &str) {
        self.filter = (!prefix.is_empty()).then(|| prefix.to_string());
    }

    async fn set_status(&self, new_status: SessionStatus) {
        {
            let mut status = self.status.write().await;
            if *status == new_status {
                return;
            }
            debug!(root = %self.root.name, "Session status: {:?} -> {:?}", *status, new_status);
            *status = new_status;
        }
        self.ctx
            .event_bus
            .publish(BrowserEvent::SessionStatusChanged {
                root: self.root.name.clone(),
                status: new_status,
            })
            .await;
    }

    /// Settle a failed connect back in Disconnected and hand the error back
    async fn fail(&mut self, err: SessionError) -> SessionError {
        warn!(root = %self.root.name, error = %err, "Connect failed");
        self.last_error = Some(err.to_string());
        if let Some(mut client) = self.client.take() {
            client.close().await;
        }
        self.connected_at = None;
        self.set_status(SessionStatus::Failed).await;

        if let Ok(node) = self.node().await {
            let mut tree = self.ctx.tree.write().await;
            let settled = tree
                .reset_subtree(node)
                .and_then(|_| tree.set_root_status(node, RootStatus::Unconnected));
            if let Err(e) = settled {
                warn!(root = %self.root.name, error = %e, "Failed to clear root after connect failure");
            }
        }

        self.set_status(SessionStatus::Disconnected).await;
        err
    }
}

/// Open a client and list the full namespace through it
///
/// The client is closed again if anything after construction fails.
async fn establish(
    ctx: &SessionContext,
    root: &RootConfig,
) -> Result<(Box<dyn StoreClient>, Vec<String>), SessionError> {
    let timeouts = ctx.timeouts;
    let mut client = timeout(
        timeouts.dial,
        ctx.connector
            .connect(&root.endpoint, &root.credentials, timeouts.dial),
    )
    .await
    .map_err(|_| ConnectionError::Timeout(millis(timeouts.dial)))??;

    let probed = timeout(timeouts.probe, client.probe(&root.endpoint))
        .await
        .map_err(|_| ConnectionError::Timeout(millis(timeouts.probe)))
        .and_then(|result| result.map_err(probe_failure));
    if let Err(err) = probed {
        client.close().await;
        return Err(err.into());
    }

    match list_keys(&*client, FULL_NAMESPACE, timeouts).await {
        Ok(keys) => Ok((client, keys)),
        Err(err) => {
            client.close().await;
            Err(err)
        }
    }
}

/// Any probe failure means the store cannot be used
fn probe_failure(err: StoreError) -> ConnectionError {
    match err {
        StoreError::Connection(e) => e,
        StoreError::Query(e) => ConnectionError::Unreachable(e.to_string()),
    }
}

/// Keys-only prefix listing bounded by the query timeout
pub(super) async fn list_keys(
    client: &dyn StoreClient,
    prefix: &str,
    timeouts: SessionTimeouts,
) -> Result<Vec<String>, SessionError> {
    let listing = timeout(timeouts.query, client.get_prefix(prefix, true))
        .await
        .map_err(|_| QueryError::Timeout(millis(timeouts.query)))??;
    Ok(listing.into_iter().map(|kv| kv.key).collect())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::MemoryEventBus;
    use crate::roots::Credentials;
    use crate::store::{MockConnector, MockFailure, MockStore};
    use crate::tree::NodeKind;

    struct Fixture {
        session: ConnectionSession,
        store: Arc<MockStore>,
        tree: Arc<RwLock<NamespaceTree>>,
        bus: Arc<MemoryEventBus>,
    }

    fn fixture(keys: &[&str]) -> Fixture {
        fixture_with(keys, SessionTimeouts::default())
    }

    fn fixture_with(keys: &[&str], timeouts: SessionTimeouts) -> Fixture {
        let store = Arc::new(MockStore::with_keys(keys.iter().copied()));
        let tree = Arc::new(RwLock::new(NamespaceTree::with_roots(["dev"])));
        let bus = Arc::new(MemoryEventBus::new(100));
        let ctx = SessionContext {
            tree: Arc::clone(&tree),
            event_bus: bus.clone(),
            connector: Arc::new(MockConnector::new(Arc::clone(&store))),
            timeouts,
        };
        let root = RootConfig::new("dev", "127.0.0.1", 2379, Credentials::default());
        Fixture {
            session: ConnectionSession::new(root, ctx),
            store,
            tree,
            bus,
        }
    }

    async fn root_kind(fx: &Fixture) -> NodeKind {
        let tree = fx.tree.read().await;
        let node = tree.connection_root("dev").unwrap();
        tree.kind(node).unwrap()
    }

    #[tokio::test]
    async fn new_session_is_disconnected() {
        let fx = fixture(&[]);
        assert_eq!(fx.session.status().await, SessionStatus::Disconnected);
        assert!(!fx.session.has_client());
    }

    #[tokio::test]
    async fn connect_builds_tree_and_marks_root() {
        let mut fx = fixture(&["/a/b/c", "/a/b/d", "/x"]);

        let listed = fx.session.connect(&CancellationToken::new()).await.unwrap();

        assert_eq!(listed, 3);
        assert_eq!(fx.session.status().await, SessionStatus::Connected);
        assert!(fx.session.connected_at().is_some());
        assert_eq!(
            root_kind(&fx).await,
            NodeKind::ConnectionRoot(RootStatus::Connected)
        );
        let tree = fx.tree.read().await;
        let node = tree.connection_root("dev").unwrap();
        assert_eq!(tree.leaf_count(node), 3);
        assert_eq!(fx.store.queried_prefixes(), vec!["/"]);
    }

    #[tokio::test]
    async fn connect_emits_status_then_reset() {
        let mut fx = fixture(&["/a"]);
        fx.session.connect(&CancellationToken::new()).await.unwrap();

        let events: Vec<BrowserEvent> = fx
            .bus
            .get_root_events("dev")
            .await
            .into_iter()
            .map(|(_, e)| e)
            .collect();

        assert!(matches!(
            events[0],
            BrowserEvent::SessionStatusChanged {
                status: SessionStatus::Connecting,
                ..
            }
        ));
        assert!(matches!(
            events[1],
            BrowserEvent::SessionStatusChanged {
                status: SessionStatus::Connected,
                ..
            }
        ));
        assert!(matches!(events[2], BrowserEvent::ItemsReset { .. }));
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let mut fx = fixture(&["/a"]);
        fx.session.connect(&CancellationToken::new()).await.unwrap();

        let result = fx.session.connect(&CancellationToken::new()).await;

        assert!(matches!(result, Err(SessionError::InvalidState { .. })));
        assert_eq!(fx.store.connect_count(), 1);
    }

    #[tokio::test]
    async fn probe_failure_releases_client() {
        let mut fx = fixture(&["/a"]);
        fx.store.fail_once(MockFailure::Probe(ConnectionError::Unreachable(
            "connection refused".to_string(),
        )));

        let result = fx.session.connect(&CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(SessionError::Connection(ConnectionError::Unreachable(_)))
        ));
        assert_eq!(fx.session.status().await, SessionStatus::Disconnected);
        assert_eq!(fx.store.open_handles(), 0);
        assert!(fx.session.last_error().is_some());
        assert_eq!(
            root_kind(&fx).await,
            NodeKind::ConnectionRoot(RootStatus::Unconnected)
        );
    }

    #[tokio::test]
    async fn failed_connect_passes_through_failed() {
        let mut fx = fixture(&[]);
        fx.store
            .fail_once(MockFailure::Query(QueryError::Failed("boom".to_string())));

        assert!(fx.session.connect(&CancellationToken::new()).await.is_err());

        let statuses: Vec<SessionStatus> = fx
            .bus
            .get_root_events("dev")
            .await
            .into_iter()
            .filter_map(|(_, e)| match e {
                BrowserEvent::SessionStatusChanged { status, .. } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                SessionStatus::Connecting,
                SessionStatus::Failed,
                SessionStatus::Disconnected
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out() {
        let mut fx = fixture(&["/a"]);
        fx.store.set_latency(Duration::from_secs(5));

        let result = fx.session.connect(&CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(SessionError::Connection(ConnectionError::Timeout(2000)))
        ));
        assert_eq!(fx.store.open_handles(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_listing_hits_query_timeout() {
        let mut fx = fixture_with(&["/a"], SessionTimeouts::from_millis(60_000, 60_000, 1_000));
        fx.store.set_latency(Duration::from_secs(5));

        let result = fx.session.connect(&CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(SessionError::Query(QueryError::Timeout(1000)))
        ));
        assert_eq!(fx.session.status().await, SessionStatus::Disconnected);
        assert_eq!(fx.store.open_handles(), 0);
        assert_eq!(
            root_kind(&fx).await,
            NodeKind::ConnectionRoot(RootStatus::Unconnected)
        );
        let tree = fx.tree.read().await;
        assert_eq!(tree.child_count(tree.connection_root("dev").unwrap()), 0);
    }

    #[tokio::test]
    async fn rejected_probe_is_a_connection_error() {
        let mut fx = fixture(&["/a"]);
        fx.store.fail_once(MockFailure::ProbeRejected(QueryError::Failed(
            "HTTP 500".to_string(),
        )));

        let result = fx.session.connect(&CancellationToken::new()).await;

        match result {
            Err(SessionError::Connection(ConnectionError::Unreachable(msg))) => {
                assert!(msg.contains("HTTP 500"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(fx.store.open_handles(), 0);
        assert!(fx.store.queried_prefixes().is_empty());
    }

    #[tokio::test]
    async fn cancelled_connect_drops_results() {
        let mut fx = fixture(&["/a"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fx.session.connect(&cancel).await;

        assert!(matches!(
            result,
            Err(SessionError::Connection(ConnectionError::Cancelled))
        ));
        assert_eq!(fx.session.status().await, SessionStatus::Disconnected);
        let tree = fx.tree.read().await;
        assert_eq!(tree.child_count(tree.connection_root("dev").unwrap()), 0);
    }

    #[tokio::test]
    async fn disconnect_clears_tree_and_closes_client() {
        let mut fx = fixture(&["/a/b", "/c"]);
        fx.session.connect(&CancellationToken::new()).await.unwrap();

        fx.session.disconnect().await.unwrap();

        assert_eq!(fx.session.status().await, SessionStatus::Disconnected);
        assert_eq!(fx.store.open_handles(), 0);
        assert_eq!(
            root_kind(&fx).await,
            NodeKind::ConnectionRoot(RootStatus::Unconnected)
        );
        let tree = fx.tree.read().await;
        assert_eq!(tree.child_count(tree.connection_root("dev").unwrap()), 0);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut fx = fixture(&[]);
        fx.session.disconnect().await.unwrap();
        fx.session.disconnect().await.unwrap();
        assert_eq!(fx.session.status().await, SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn get_value_returns_stored_bytes() {
        let mut fx = fixture(&[]);
        fx.store.put("/cfg/port", "8080");
        fx.session.connect(&CancellationToken::new()).await.unwrap();

        let value = fx.session.get_value("/cfg/port").await.unwrap();
        assert_eq!(value, b"8080");
    }

    #[tokio::test]
    async fn get_value_missing_key_fails() {
        let mut fx = fixture(&["/a"]);
        fx.session.connect(&CancellationToken::new()).await.unwrap();

        let result = fx.session.get_value("/nope").await;
        assert!(matches!(
            result,
            Err(SessionError::Query(QueryError::KeyNotFound(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_get_hits_query_timeout() {
        let mut fx = fixture_with(&["/a"], SessionTimeouts::from_millis(60_000, 60_000, 1_000));
        fx.session.connect(&CancellationToken::new()).await.unwrap();
        fx.store.set_latency(Duration::from_secs(5));

        let result = fx.session.get_value("/a").await;

        assert!(matches!(
            result,
            Err(SessionError::Query(QueryError::Timeout(1000)))
        ));
        assert_eq!(fx.session.status().await, SessionStatus::Connected);
    }

    #[tokio::test]
    async fn get_value_requires_connection() {
        let fx = fixture(&["/a"]);
        let result = fx.session.get_value("/a").await;
        assert!(matches!(result, Err(SessionError::InvalidState { .. })));
    }
}
