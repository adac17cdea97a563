//! Configured roots and their persistence

pub mod config;
pub mod repository;
pub mod store;

pub use config::{Credentials, DEFAULT_PORT, RootConfig};
pub use repository::RootRepository;
pub use store::{JsonRootStore, MemoryRootStore, RootMap, RootStore};
