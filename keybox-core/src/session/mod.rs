//! Connection sessions
//!
//! One [`ConnectionSession`] per root owns the store client and rebuilds
//! that root's subtree; [`SessionManager`] routes operations to sessions and
//! runs them in the background on request.

pub mod config;
pub mod manager;
mod search;
pub mod state;
pub mod tasks;

// Re-export key types for convenience
pub use config::SessionTimeouts;
pub use manager::{OpenOutcome, SessionManager};
pub use state::{ConnectionSession, FULL_NAMESPACE, SessionContext, SessionStatus};
pub use tasks::{OpCompletion, SessionOp};
