//! Prefix-filtered rebuild of a connected root

use tracing::{info, warn};

use super::state::{ConnectionSession, FULL_NAMESPACE, list_keys};
use crate::error::SessionError;
use crate::tree::RootStatus;

impl ConnectionSession {
    /// Replace the root's subtree with the keys under `prefix`
    ///
    /// An empty prefix lists the full namespace and returns the root to
    /// Connected; any other prefix marks it Searching. The subtree is reset
    /// before the query, so a failed query leaves it empty. Returns the
    /// number of keys listed.
    pub async fn search(&mut self, prefix: &str) -> Result<usize, SessionError> {
        let client = self.connected_client().await?;
        let node = self.node().await?;

        {
            let mut tree = self.tree().write().await;
            tree.reset_subtree(node)?;
        }

        let query = if prefix.is_empty() {
            FULL_NAMESPACE
        } else {
            prefix
        };
        let keys = match list_keys(client, query, self.timeouts()).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(root = %self.name(), prefix = %prefix, error = %err, "Search failed");
                self.publish_reset(node).await;
                return Err(err);
            }
        };

        let status = if prefix.is_empty() {
            RootStatus::Connected
        } else {
            RootStatus::Searching
        };
        let stats = self.rebuild(node, &keys, status).await?;
        self.set_filter(prefix);
        self.publish_reset(node).await;

        info!(root = %self.name(), prefix = %prefix, keys = stats.keys, "Search complete");
        Ok(stats.keys)
    }
}
