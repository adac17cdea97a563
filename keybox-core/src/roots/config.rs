//! Root connection definitions
//!
//! Field names are PascalCase so that roots files written by earlier
//! versions of the browser load unchanged.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Default port of an etcd client listener
pub const DEFAULT_PORT: u16 = 2379;

/// Credentials used when connecting to a store
///
/// The password never shows up in `Debug` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credentials {
    #[serde(default)]
    pub username: String,

    #[serde(
        default,
        serialize_with = "serialize_password",
        deserialize_with = "deserialize_password",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<SecretString>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let password: String = password.into();
        Self {
            username: username.into(),
            password: (!password.is_empty()).then(|| SecretString::from(password)),
        }
    }

    /// Whether the store should be asked to authenticate
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }

    /// Expose the password for the authentication request
    pub fn expose_password(&self) -> &str {
        self.password
            .as_ref()
            .map(|p| p.expose_secret())
            .unwrap_or_default()
    }
}

fn serialize_password<S>(password: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match password {
        Some(secret) => serializer.serialize_str(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_password<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|p| !p.is_empty())
        .map(SecretString::from))
}

/// A named store connection target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RootConfig {
    #[serde(default)]
    pub name: String,

    /// Base URL of the store, e.g. `http://127.0.0.1:2379`
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: u16,

    #[serde(flatten)]
    pub credentials: Credentials,
}

impl RootConfig {
    /// Build a root from host and port, deriving the endpoint
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
    ) -> Self {
        let host = host.into();
        Self {
            name: name.into(),
            endpoint: format!("http://{}:{}", host, port),
            host,
            port,
            credentials,
        }
    }

    /// Check required fields before the root is persisted
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name is required".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "root '{}' needs a host",
                self.name
            )));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid(format!(
                "root '{}' needs a port greater than zero",
                self.name
            )));
        }
        Ok(())
    }

    /// Derive the endpoint from host and port when it is blank
    pub(crate) fn fill_endpoint(&mut self) {
        if self.endpoint.trim().is_empty() {
            self.endpoint = format!("http://{}:{}", self.host, self.port);
        }
    }
}
