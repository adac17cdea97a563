//! Key-value store capability
//!
//! The session only talks to stores through [`StoreConnector`] and
//! [`StoreClient`]. [`EtcdConnector`] speaks the etcd v3 JSON gateway;
//! [`MockConnector`] serves scripted data for tests.

pub mod etcd;
pub mod mock;
pub mod traits;

pub use etcd::EtcdConnector;
pub use mock::{MockConnector, MockFailure, MockStore};
pub use traits::{KeyValue, StoreClient, StoreConnector};
