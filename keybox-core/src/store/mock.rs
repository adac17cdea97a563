//! Mock store for testing
//!
//! MockStore keeps keys in a sorted map and lets tests script failures and
//! latency per stage, enabling deterministic tests of the session logic
//! without a running store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{KeyValue, StoreClient, StoreConnector};
use crate::error::{ConnectionError, QueryError, StoreError};
use crate::roots::Credentials;

/// A failure to inject at one stage of the store protocol
#[derive(Debug, Clone, PartialEq)]
pub enum MockFailure {
    Connect(ConnectionError),
    Probe(ConnectionError),
    /// The store answered the probe with an error status
    ProbeRejected(QueryError),
    Query(QueryError),
    Get(QueryError),
}

impl MockFailure {
    fn stage(&self) -> u8 {
        match self {
            Self::Connect(_) => 0,
            Self::Probe(_) | Self::ProbeRejected(_) => 1,
            Self::Query(_) => 2,
            Self::Get(_) => 3,
        }
    }

    fn into_error(self) -> StoreError {
        match self {
            Self::Connect(e) | Self::Probe(e) => StoreError::Connection(e),
            Self::ProbeRejected(e) | Self::Query(e) | Self::Get(e) => StoreError::Query(e),
        }
    }
}

/// Shared state behind every client handed out by a [`MockConnector`]
#[derive(Default)]
pub struct MockStore {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
    failures: Mutex<Vec<MockFailure>>,
    latency: Mutex<Duration>,
    connects: AtomicUsize,
    open_handles: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `keys`, each valued with its own name
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for key in keys {
            let key = key.into();
            store.put(key.clone(), key.into_bytes());
        }
        store
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        if let Ok(mut data) = self.data.lock() {
            data.insert(key.into(), value.into());
        }
    }

    /// Fail the next call at the failure's stage
    pub fn fail_once(&self, failure: MockFailure) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(failure);
        }
    }

    /// Delay every probe, listing and get by `latency`
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut current) = self.latency.lock() {
            *current = latency;
        }
    }

    /// Number of successful connects
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Clients handed out and not yet closed or dropped
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Prefixes queried so far, in order
    pub fn queried_prefixes(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn take_failure(&self, stage: u8) -> Result<(), StoreError> {
        let mut failures = match self.failures.lock() {
            Ok(failures) => failures,
            Err(_) => return Ok(()),
        };
        match failures.iter().position(|f| f.stage() == stage) {
            Some(index) => Err(failures.remove(index).into_error()),
            None => Ok(()),
        }
    }

    async fn delay(&self) {
        let latency = self.latency.lock().map(|l| *l).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Connector handing out clients over a shared [`MockStore`]
#[derive(Clone)]
pub struct MockConnector {
    store: Arc<MockStore>,
}

impl MockConnector {
    pub fn new(store: Arc<MockStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MockStore> {
        &self.store
    }
}

#[async_trait]
impl StoreConnector for MockConnector {
    async fn connect(
        &self,
        _endpoint: &str,
        _credentials: &Credentials,
        _dial_timeout: Duration,
    ) -> Result<Box<dyn StoreClient>, StoreError> {
        self.store.take_failure(0)?;
        self.store.connects.fetch_add(1, Ordering::SeqCst);
        self.store.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockClient {
            store: Arc::clone(&self.store),
            closed: false,
        }))
    }
}

struct MockClient {
    store: Arc<MockStore>,
    closed: bool,
}

impl MockClient {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.store.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockClient {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl StoreClient for MockClient {
    async fn probe(&self, _endpoint: &str) -> Result<(), StoreError> {
        self.store.delay().await;
        self.store.take_failure(1)
    }

    async fn get_prefix(&self, prefix: &str, keys_only: bool) -> Result<Vec<KeyValue>, StoreError> {
        if let Ok(mut queries) = self.store.queries.lock() {
            queries.push(prefix.to_string());
        }
        self.store.delay().await;
        self.store.take_failure(2)?;

        let data = self
            .store
            .data
            .lock()
            .map_err(|e| StoreError::Query(QueryError::Failed(e.to_string())))?;
        Ok(data
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| KeyValue {
                key: key.clone(),
                value: (!keys_only).then(|| value.clone()),
            })
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.delay().await;
        self.store.take_failure(3)?;
        let data = self
            .store
            .data
            .lock()
            .map_err(|e| StoreError::Query(QueryError::Failed(e.to_string())))?;
        Ok(data.get(key).cloned())
    }

    async fn close(&mut self) {
        self.release();
    }
}
