//! Session timeouts

use std::time::Duration;

/// Default bound on opening a client handle
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bound on the reachability probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bound on prefix listings and value fetches
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Time limits applied to every store round-trip a session makes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub dial: Duration,
    pub probe: Duration,
    pub query: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            dial: DEFAULT_DIAL_TIMEOUT,
            probe: DEFAULT_PROBE_TIMEOUT,
            query: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl SessionTimeouts {
    /// Build timeouts from millisecond values
    pub fn from_millis(dial: u64, probe: u64, query: u64) -> Self {
        Self {
            dial: Duration::from_millis(dial),
            probe: Duration::from_millis(probe),
            query: Duration::from_millis(query),
        }
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
