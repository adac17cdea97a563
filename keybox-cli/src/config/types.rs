use std::path::PathBuf;

use keybox_core::SessionTimeouts;
use serde::{Deserialize, Serialize};

/// Default bound on opening a store client, in milliseconds
pub const DEFAULT_DIAL_TIMEOUT_MS: u64 = 2_000;

/// Default bound on the liveness probe, in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Default bound on prefix listings and value fetches, in milliseconds
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawKeyboxConfig {
    #[serde(default)]
    pub connect: RawConnectConfig,

    #[serde(default)]
    pub roots: RawRootsConfig,
}

/// Connect timeouts as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConnectConfig {
    pub dial_timeout_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub query_timeout_ms: Option<u64>,
}

/// Roots registry location as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRootsConfig {
    pub file: Option<PathBuf>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeyboxConfig {
    #[serde(default)]
    pub connect: ConnectConfig,

    #[serde(default)]
    pub roots: RootsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Bound on opening a store client
    pub dial_timeout_ms: u64,

    /// Bound on the liveness probe
    pub probe_timeout_ms: u64,

    /// Bound on prefix listings and value fetches
    pub query_timeout_ms: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            dial_timeout_ms: DEFAULT_DIAL_TIMEOUT_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
        }
    }
}

impl ConnectConfig {
    pub fn timeouts(&self) -> SessionTimeouts {
        SessionTimeouts::from_millis(
            self.dial_timeout_ms,
            self.probe_timeout_ms,
            self.query_timeout_ms,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsConfig {
    /// Path of the JSON roots registry
    pub file: PathBuf,
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self {
            file: keybox_paths::roots_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_values() {
        let config = KeyboxConfig::default();
        assert_eq!(config.connect.probe_timeout_ms, 2_000);
        assert_eq!(config.connect.query_timeout_ms, 10_000);
        assert!(config.roots.file.ends_with(keybox_paths::ROOTS_FILE));
    }

    #[test]
    fn test_timeouts_convert_millis() {
        let connect = ConnectConfig {
            dial_timeout_ms: 100,
            probe_timeout_ms: 250,
            query_timeout_ms: 5_000,
        };
        let timeouts = connect.timeouts();
        assert_eq!(timeouts.dial, Duration::from_millis(100));
        assert_eq!(timeouts.probe, Duration::from_millis(250));
        assert_eq!(timeouts.query, Duration::from_secs(5));
    }

    #[test]
    fn test_raw_config_fields_are_optional() {
        let raw: RawKeyboxConfig = toml::from_str("[connect]\nprobe_timeout_ms = 500\n").unwrap();
        assert_eq!(raw.connect.probe_timeout_ms, Some(500));
        assert!(raw.connect.query_timeout_ms.is_none());
        assert!(raw.roots.file.is_none());
    }
}
