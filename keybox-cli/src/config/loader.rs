use super::types::{
    ConnectConfig, KeyboxConfig, RawConnectConfig, RawKeyboxConfig, RawRootsConfig, RootsConfig,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<KeyboxConfig> {
        Self::load_from(Some(&Self::user_config_path()), &Self::project_config_path())
    }

    /// Load configuration layered from explicit paths
    ///
    /// Missing files are skipped; values in `project` win over `user`.
    pub fn load_from(user: Option<&Path>, project: &Path) -> Result<KeyboxConfig> {
        let mut raw = RawKeyboxConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(user_path)?);
        }

        // Layer 2: Project config
        if project.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(project)?);
        }

        // Convert to final config with defaults applied
        Ok(Self::finalize(raw))
    }

    /// Get user config path
    pub fn user_config_path() -> PathBuf {
        keybox_paths::config_file()
    }

    /// Get project config path
    /// Can be overridden with KEYBOX_PROJECT_CONFIG_DIR env var (useful for isolated e2e tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("KEYBOX_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join(keybox_paths::CONFIG_FILE)
        } else {
            PathBuf::from(".keybox").join(keybox_paths::CONFIG_FILE)
        }
    }

    fn read_raw(path: &Path) -> Result<RawKeyboxConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(raw)
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawKeyboxConfig, overlay: RawKeyboxConfig) -> RawKeyboxConfig {
        RawKeyboxConfig {
            connect: RawConnectConfig {
                dial_timeout_ms: overlay
                    .connect
                    .dial_timeout_ms
                    .or(base.connect.dial_timeout_ms),
                probe_timeout_ms: overlay
                    .connect
                    .probe_timeout_ms
                    .or(base.connect.probe_timeout_ms),
                query_timeout_ms: overlay
                    .connect
                    .query_timeout_ms
                    .or(base.connect.query_timeout_ms),
            },
            roots: RawRootsConfig {
                file: overlay.roots.file.or(base.roots.file),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawKeyboxConfig) -> KeyboxConfig {
        let defaults = ConnectConfig::default();
        KeyboxConfig {
            connect: ConnectConfig {
                dial_timeout_ms: raw.connect.dial_timeout_ms.unwrap_or(defaults.dial_timeout_ms),
                probe_timeout_ms: raw
                    .connect
                    .probe_timeout_ms
                    .unwrap_or(defaults.probe_timeout_ms),
                query_timeout_ms: raw
                    .connect
                    .query_timeout_ms
                    .unwrap_or(defaults.query_timeout_ms),
            },
            roots: raw
                .roots
                .file
                .map(|file| RootsConfig { file })
                .unwrap_or_default(),
        }
    }

    /// Save config to a specific path
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to_path(config: &KeyboxConfig, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(config)?;
        std::fs::write(path, toml)?;

        Ok(())
    }
}
