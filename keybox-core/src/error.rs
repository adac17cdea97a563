//! Error types for keybox-core

use thiserror::Error;

use crate::tree::TreeError;

/// Top-level error type for keybox-core
#[derive(Error, Debug)]
pub enum KeyboxError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors loading or saving the persisted roots registry
///
/// Fatal when raised at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Roots file not found: {0}")]
    Missing(String),

    #[error("Roots file is malformed: {0}")]
    Malformed(String),

    #[error("Invalid root definition: {0}")]
    Invalid(String),

    #[error("Failed to write roots file: {0}")]
    Write(String),
}

/// Errors mutating the registry of configured roots
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("A root named '{0}' already exists")]
    DuplicateName(String),

    #[error("Root not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors establishing a connection to a store
///
/// All variants are recoverable: the root returns to Unconnected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Connect attempt was cancelled")]
    Cancelled,
}

/// Errors from prefix listings and direct key fetches
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Query timed out after {0} ms")]
    Timeout(u64),

    #[error("Query failed: {0}")]
    Failed(String),
}

/// Errors from store clients, before the session classifies them
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Errors related to session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Root not found: {0}")]
    NotFound(String),

    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Another operation is in progress for root '{0}'")]
    Busy(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(e) => SessionError::Connection(e),
            StoreError::Query(e) => SessionError::Query(e),
        }
    }
}
