//! Registry of configured roots
//!
//! The repository is the single writer of the roots map. Readers (the
//! presentation layer enumerating roots) and writers (add/remove) go through
//! its lock, and every mutation is persisted before it becomes visible.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::config::RootConfig;
use super::store::{RootMap, RootStore};
use crate::error::{ConfigError, RegistryError};

/// Configured roots backed by a [`RootStore`]
pub struct RootRepository {
    roots: RwLock<RootMap>,
    store: Arc<dyn RootStore>,
}

impl RootRepository {
    /// Load the registry from its store
    ///
    /// A missing or malformed store is a [`ConfigError`].
    pub async fn load(store: Arc<dyn RootStore>) -> Result<Self, ConfigError> {
        let roots = store.load_roots().await?;
        Ok(Self {
            roots: RwLock::new(roots),
            store,
        })
    }

    /// Root names in display order
    pub async fn names(&self) -> Vec<String> {
        self.roots.read().await.keys().cloned().collect()
    }

    pub async fn get(&self, name: &str) -> Option<RootConfig> {
        self.roots.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.roots.read().await.contains_key(name)
    }

    pub async fn list(&self) -> Vec<RootConfig> {
        self.roots.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.roots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.roots.read().await.is_empty()
    }

    /// Add and persist a root
    ///
    /// Duplicate names are rejected before anything is written. If the
    /// write fails the registry is left unchanged.
    pub async fn add(&self, root: RootConfig) -> Result<(), RegistryError> {
        root.validate()?;

        let mut roots = self.roots.write().await;
        if roots.contains_key(&root.name) {
            return Err(RegistryError::DuplicateName(root.name));
        }

        let mut updated = roots.clone();
        let name = root.name.clone();
        updated.insert(name.clone(), root);
        self.store.save_roots(&updated).await?;
        *roots = updated;

        info!(root = %name, "Root added");
        Ok(())
    }

    /// Remove and persist a root, returning its definition
    pub async fn remove(&self, name: &str) -> Result<RootConfig, RegistryError> {
        let mut roots = self.roots.write().await;
        if !roots.contains_key(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }

        let mut updated = roots.clone();
        let removed = updated
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        self.store.save_roots(&updated).await?;
        *roots = updated;

        info!(root = %name, "Root removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roots::{Credentials, MemoryRootStore};

    fn root(name: &str) -> RootConfig {
        RootConfig::new(name, "127.0.0.1", 2379, Credentials::default())
    }

    async fn repository_with(names: &[&str]) -> (RootRepository, Arc<MemoryRootStore>) {
        let store = Arc::new(MemoryRootStore::new(names.iter().map(|n| root(n))));
        let repo = RootRepository::load(store.clone()).await.unwrap();
        (repo, store)
    }

    #[tokio::test]
    async fn load_lists_roots_sorted() {
        let (repo, _) = repository_with(&["prod", "dev"]).await;
        assert_eq!(repo.names().await, vec!["dev", "prod"]);
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn add_persists_new_root() {
        let (repo, store) = repository_with(&["dev"]).await;

        repo.add(root("stage")).await.unwrap();

        assert!(repo.contains("stage").await);
        assert_eq!(store.persisted_names(), vec!["dev", "stage"]);
    }

    #[tokio::test]
    async fn add_duplicate_is_rejected_without_writing() {
        let store = Arc::new(MemoryRootStore::failing([root("dev")]));
        let repo = RootRepository::load(store.clone()).await.unwrap();

        // A failing store proves the duplicate check happens before the save
        let result = repo.add(root("dev")).await;
        assert!(matches!(result, Err(RegistryError::DuplicateName(name)) if name == "dev"));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn failed_save_leaves_registry_unchanged() {
        let store = Arc::new(MemoryRootStore::failing([root("dev")]));
        let repo = RootRepository::load(store).await.unwrap();

        let result = repo.add(root("prod")).await;
        assert!(matches!(result, Err(RegistryError::Config(_))));
        assert!(!repo.contains("prod").await);
    }

    #[tokio::test]
    async fn add_invalid_root_is_rejected() {
        let (repo, _) = repository_with(&[]).await;
        let result = repo.add(root("  ")).await;
        assert!(matches!(result, Err(RegistryError::Config(ConfigError::Invalid(_)))));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn remove_returns_definition() {
        let (repo, store) = repository_with(&["dev", "prod"]).await;

        let removed = repo.remove("dev").await.unwrap();

        assert_eq!(removed.name, "dev");
        assert_eq!(repo.names().await, vec!["prod"]);
        assert_eq!(store.persisted_names(), vec!["prod"]);
    }

    #[tokio::test]
    async fn remove_unknown_root_fails() {
        let (repo, _) = repository_with(&["dev"]).await;
        let result = repo.remove("nope").await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }
}
