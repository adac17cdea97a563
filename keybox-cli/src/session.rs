//! Wiring of the core session machinery for one CLI invocation

use std::sync::Arc;

use anyhow::{Context, Result};
use keybox_core::{
    EtcdConnector, EventBus, JsonRootStore, MemoryEventBus, RootRepository, SessionManager,
};

use crate::config::KeyboxConfig;

/// Event history kept per invocation
const EVENT_CAPACITY: usize = 1024;

/// Load the roots registry named by `config`
pub async fn load_registry(config: &KeyboxConfig) -> Result<Arc<RootRepository>> {
    let store = Arc::new(JsonRootStore::new(&config.roots.file));
    let registry = RootRepository::load(store).await.with_context(|| {
        format!(
            "Failed to load roots from {} (add one with `keybox roots add`)",
            config.roots.file.display()
        )
    })?;
    Ok(Arc::new(registry))
}

/// Build a session manager talking to etcd
pub async fn open_manager(config: &KeyboxConfig) -> Result<Arc<SessionManager>> {
    let registry = load_registry(config).await?;
    let event_bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(EVENT_CAPACITY));
    let manager = SessionManager::new(
        registry,
        Arc::new(EtcdConnector::new()),
        event_bus,
        config.connect.timeouts(),
    )
    .await;
    Ok(Arc::new(manager))
}
