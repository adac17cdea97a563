//! Background session operations
//!
//! Connects and searches can run on spawned tasks so the caller never waits
//! on the store. Each spawned operation gets an id and reports exactly one
//! [`OpCompletion`] on the manager's completion channel.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::manager::SessionManager;
use crate::error::SessionError;

/// Kind of a background operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOp {
    Connect,
    Reconnect,
    Search { prefix: String },
}

/// Outcome of a background operation
#[derive(Debug)]
pub struct OpCompletion {
    pub id: Uuid,
    pub root: String,
    pub op: SessionOp,
    /// Keys listed on success
    pub result: Result<usize, SessionError>,
}

impl SessionManager {
    /// Connect `root` on a background task
    ///
    /// The attempt is registered before the task starts, so
    /// [`SessionManager::cancel_connect`] can reach it immediately.
    pub fn spawn_connect(self: &Arc<Self>, root: &str) -> Uuid {
        let id = Uuid::new_v4();
        let root = root.to_string();

        let (attempt, cancel) = match self.register_attempt(&root) {
            Ok(registered) => registered,
            Err(err) => {
                self.complete(id, root, SessionOp::Connect, Err(err));
                return id;
            }
        };

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let result = manager.connect_attempt(&root, &cancel).await;
            manager.clear_attempt(&root, attempt);
            manager.complete(id, root, SessionOp::Connect, result);
        });
        id
    }

    /// Reconnect `root` on a background task
    pub fn spawn_reconnect(self: &Arc<Self>, root: &str) -> Uuid {
        let id = Uuid::new_v4();
        let root = root.to_string();
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let result = manager.reconnect(&root).await;
            manager.complete(id, root, SessionOp::Reconnect, result);
        });
        id
    }

    /// Search `root` on a background task
    pub fn spawn_search(self: &Arc<Self>, root: &str, prefix: &str) -> Uuid {
        let id = Uuid::new_v4();
        let root = root.to_string();
        let prefix = prefix.to_string();
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let result = manager.search(&root, &prefix).await;
            manager.complete(id, root, SessionOp::Search { prefix }, result);
        });
        id
    }

    fn complete(&self, id: Uuid, root: String, op: SessionOp, result: Result<usize, SessionError>) {
        debug!(id = %id, root = %root, op = ?op, ok = result.is_ok(), "Operation complete");
        // The receiver may have been dropped; nobody is waiting then
        let _ = self.completion_sender().send(OpCompletion {
            id,
            root,
            op,
            result,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ConnectionError;
    use crate::events::{EventBus, MemoryEventBus};
    use crate::roots::{Credentials, MemoryRootStore, RootConfig, RootRepository};
    use crate::session::{SessionStatus, SessionTimeouts};
    use crate::store::{MockConnector, MockStore, StoreConnector};

    async fn create_test_manager(keys: &[&str]) -> (Arc<SessionManager>, Arc<MockStore>) {
        let roots = Arc::new(MemoryRootStore::new([
            RootConfig::new("dev", "127.0.0.1", 2379, Credentials::default()),
            RootConfig::new("prod", "127.0.0.1", 2380, Credentials::default()),
        ]));
        let registry = Arc::new(RootRepository::load(roots).await.unwrap());
        let store = Arc::new(MockStore::with_keys(keys.iter().copied()));
        let connector: Arc<dyn StoreConnector> = Arc::new(MockConnector::new(Arc::clone(&store)));
        let event_bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(100));
        let manager =
            SessionManager::new(registry, connector, event_bus, SessionTimeouts::default()).await;
        (Arc::new(manager), store)
    }

    #[tokio::test]
    async fn spawned_connect_reports_completion() {
        let (manager, _) = create_test_manager(&["/a", "/b"]).await;
        let mut completions = manager.take_completions().unwrap();

        let id = manager.spawn_connect("dev");
        let done = completions.recv().await.unwrap();

        assert_eq!(done.id, id);
        assert_eq!(done.root, "dev");
        assert_eq!(done.op, SessionOp::Connect);
        assert_eq!(done.result.unwrap(), 2);
        assert_eq!(manager.status("dev").await, SessionStatus::Connected);
    }

    #[tokio::test]
    async fn spawned_search_carries_prefix() {
        let (manager, _) = create_test_manager(&["/a/1", "/a/2", "/b"]).await;
        manager.connect("dev").await.unwrap();
        let mut completions = manager.take_completions().unwrap();

        manager.spawn_search("dev", "/a");
        let done = completions.recv().await.unwrap();

        assert_eq!(
            done.op,
            SessionOp::Search {
                prefix: "/a".to_string()
            }
        );
        assert_eq!(done.result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_connect_completes_with_cancelled() {
        let (manager, store) = create_test_manager(&["/a"]).await;
        store.set_latency(Duration::from_millis(500));
        let mut completions = manager.take_completions().unwrap();

        manager.spawn_connect("dev");
        assert!(manager.cancel_connect("dev"));
        let done = completions.recv().await.unwrap();

        assert!(matches!(
            done.result,
            Err(SessionError::Connection(ConnectionError::Cancelled))
        ));
        assert_eq!(manager.status("dev").await, SessionStatus::Disconnected);
        assert_eq!(store.open_handles(), 0);
        assert!(!manager.cancel_connect("dev"));
    }

    #[tokio::test(start_paused = true)]
    async fn second_connect_while_in_flight_is_busy() {
        let (manager, store) = create_test_manager(&["/a"]).await;
        store.set_latency(Duration::from_millis(500));
        let mut completions = manager.take_completions().unwrap();

        let first = manager.spawn_connect("dev");
        let second = manager.spawn_connect("dev");

        let mut results = Vec::new();
        for _ in 0..2 {
            let done = completions.recv().await.unwrap();
            results.push((done.id, done.result.is_ok()));
        }
        results.sort_by_key(|(id, _)| *id != first);

        assert_eq!(results, vec![(first, true), (second, false)]);
        assert_eq!(store.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_roots_connect_concurrently() {
        let (manager, store) = create_test_manager(&["/a"]).await;
        store.set_latency(Duration::from_millis(500));
        let mut completions = manager.take_completions().unwrap();

        manager.spawn_connect("dev");
        manager.spawn_connect("prod");

        for _ in 0..2 {
            assert!(completions.recv().await.unwrap().result.is_ok());
        }
        assert_eq!(store.connect_count(), 2);
    }
}
