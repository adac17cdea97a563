//! Store client traits

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::roots::Credentials;

/// A key and, unless the read was keys-only, its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

impl KeyValue {
    pub fn key_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// An open handle to a store
///
/// Owned exclusively by one session.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Liveness check against `endpoint`
    async fn probe(&self, endpoint: &str) -> Result<(), StoreError>;

    /// Range read of every key starting with `prefix`, in store order
    async fn get_prefix(&self, prefix: &str, keys_only: bool) -> Result<Vec<KeyValue>, StoreError>;

    /// Direct read of one key, `None` if it does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Release the handle
    async fn close(&mut self);
}

/// Factory for store clients
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        credentials: &Credentials,
        dial_timeout: Duration,
    ) -> Result<Box<dyn StoreClient>, StoreError>;
}
