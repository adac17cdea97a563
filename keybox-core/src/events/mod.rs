//! Event system for keybox
//!
//! Tree mutations and session status changes are published on an
//! [`EventBus`]. The presentation layer subscribes and drops its cached
//! children of a node whenever it sees [`BrowserEvent::ItemsReset`] for it.

pub mod bus;
pub mod memory;
pub mod types;

// Re-export key types for convenience
pub use bus::{EventBus, EventSeq};
pub use memory::MemoryEventBus;
pub use types::BrowserEvent;
