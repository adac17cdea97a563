//! XDG Base Directory paths for keybox.
//!
//! keybox follows XDG paths on every platform so the roots file lives in the
//! same place a user would look for it with tools like etcdctl or kubectl.

use std::path::PathBuf;

/// File name of the persisted roots registry.
pub const ROOTS_FILE: &str = "roots.json";

/// Get the keybox config directory.
///
/// Returns `$XDG_CONFIG_HOME/keybox` if set, otherwise `~/.config/keybox`.
/// This is where `config.toml` and the roots registry are stored.
///
/// # Examples
///
/// ```
/// use keybox_paths::config_dir;
///
/// let config = config_dir();
/// let settings = config.join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("keybox")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/keybox")
    } else {
        PathBuf::from(".config/keybox")
    }
}

/// File name of the CLI settings.
pub const CONFIG_FILE: &str = "config.toml";

/// Default location of the user's CLI settings.
pub fn config_file() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Default location of the roots registry file.
pub fn roots_file() -> PathBuf {
    config_dir().join(ROOTS_FILE)
}
