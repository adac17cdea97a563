//! Persistence of the roots registry

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::config::RootConfig;
use crate::error::ConfigError;

/// Roots keyed by name
pub type RootMap = BTreeMap<String, RootConfig>;

/// Backing storage for configured roots
#[async_trait]
pub trait RootStore: Send + Sync {
    /// Load every persisted root
    async fn load_roots(&self) -> Result<RootMap, ConfigError>;

    /// Replace the persisted roots with `roots`
    async fn save_roots(&self, roots: &RootMap) -> Result<(), ConfigError>;
}

/// Roots persisted as a JSON object keyed by name
pub struct JsonRootStore {
    file_path: PathBuf,
}

impl JsonRootStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Write an empty registry if the file does not exist yet
    pub async fn ensure_exists(&self) -> Result<(), ConfigError> {
        if !self.file_path.exists() {
            self.save_roots(&RootMap::new()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RootStore for JsonRootStore {
    async fn load_roots(&self) -> Result<RootMap, ConfigError> {
        if !self.file_path.exists() {
            return Err(ConfigError::Missing(self.file_path.display().to_string()));
        }

        let content = fs::read_to_string(&self.file_path).await.map_err(|e| {
            ConfigError::Malformed(format!("failed to read {}: {}", self.file_path.display(), e))
        })?;

        let mut roots: RootMap = serde_json::from_str(&content).map_err(|e| {
            ConfigError::Malformed(format!("{}: {}", self.file_path.display(), e))
        })?;

        // The map key is authoritative for the name
        for (name, root) in roots.iter_mut() {
            if root.name != *name {
                root.name = name.clone();
            }
            root.validate()?;
            root.fill_endpoint();
        }

        debug!(path = %self.file_path.display(), count = roots.len(), "Loaded roots");
        Ok(roots)
    }

    async fn save_roots(&self, roots: &RootMap) -> Result<(), ConfigError> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                ConfigError::Write(format!("failed to create config dir: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(roots)
            .map_err(|e| ConfigError::Write(format!("failed to serialize roots: {}", e)))?;

        fs::write(&self.file_path, content)
            .await
            .map_err(|e| ConfigError::Write(format!("failed to write roots: {}", e)))?;

        Ok(())
    }
}

/// In-memory root storage for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryRootStore {
    roots: Mutex<RootMap>,
    fail_saves: bool,
}

impl MemoryRootStore {
    pub fn new(roots: impl IntoIterator<Item = RootConfig>) -> Self {
        Self {
            roots: Mutex::new(roots.into_iter().map(|r| (r.name.clone(), r)).collect()),
            fail_saves: false,
        }
    }

    /// A store whose saves always fail
    pub fn failing(roots: impl IntoIterator<Item = RootConfig>) -> Self {
        Self {
            fail_saves: true,
            ..Self::new(roots)
        }
    }

    /// Names currently persisted
    pub fn persisted_names(&self) -> Vec<String> {
        self.roots
            .lock()
            .map(|roots| roots.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RootStore for MemoryRootStore {
    async fn load_roots(&self) -> Result<RootMap, ConfigError> {
        self.roots
            .lock()
            .map(|roots| roots.clone())
            .map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    async fn save_roots(&self, roots: &RootMap) -> Result<(), ConfigError> {
        if self.fail_saves {
            return Err(ConfigError::Write("storage is read-only".to_string()));
        }
        let mut stored = self
            .roots
            .lock()
            .map_err(|e| ConfigError::Write(e.to_string()))?;
        *stored = roots.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roots::Credentials;
    use tempfile::tempdir;

    fn root(name: &str) -> RootConfig {
        RootConfig::new(name, "127.0.0.1", 2379, Credentials::new("root", "secret"))
    }

    #[tokio::test]
    async fn load_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let store = JsonRootStore::new(dir.path().join("roots.json"));

        let result = store.load_roots().await;
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[tokio::test]
    async fn load_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roots.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonRootStore::new(&path).load_roots().await;
        assert!(matches!(result, Err(ConfigError::Malformed(_))));
    }

    #[tokio::test]
    async fn save_then_load_preserves_roots() {
        let dir = tempdir().unwrap();
        let store = JsonRootStore::new(dir.path().join("nested/roots.json"));

        let mut roots = RootMap::new();
        roots.insert("dev".to_string(), root("dev"));
        roots.insert("prod".to_string(), root("prod"));
        store.save_roots(&roots).await.unwrap();

        let loaded = store.load_roots().await.unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["dev", "prod"]);
        assert_eq!(loaded["prod"].credentials.expose_password(), "secret");
    }

    #[tokio::test]
    async fn load_accepts_legacy_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"local":{"Name":"local","Endpoint":"http://127.0.0.1:2379","Host":"127.0.0.1","Port":2379,"Username":"","Password":""}}"#,
        )
        .unwrap();

        let loaded = JsonRootStore::new(&path).load_roots().await.unwrap();
        assert_eq!(loaded["local"].endpoint, "http://127.0.0.1:2379");
        assert!(loaded["local"].credentials.password.is_none());
    }

    #[tokio::test]
    async fn ensure_exists_writes_empty_registry() {
        let dir = tempdir().unwrap();
        let store = JsonRootStore::new(dir.path().join("roots.json"));

        store.ensure_exists().await.unwrap();
        assert!(store.load_roots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_memory_store_rejects_saves() {
        let store = MemoryRootStore::failing([root("dev")]);
        assert!(store.save_roots(&RootMap::new()).await.is_err());
        assert_eq!(store.persisted_names(), vec!["dev"]);
    }
}
