//! The channel tree mutations travel on
//!
//! Sessions publish here after every change to a root's subtree; a tree view
//! subscribes and re-reads the nodes named in each event.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::BrowserEvent;

/// Position of an event on the bus, starting at 0
pub type EventSeq = u64;

/// Ordered stream of [`BrowserEvent`]s
///
/// A view that attaches after roots were already connected catches up with
/// [`events_from`](Self::events_from) and then follows
/// [`subscribe`](Self::subscribe). Sequence numbers are gap-free, so the
/// seam between the two is exact.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Announce a mutation; the returned number orders it against all others
    async fn publish(&self, event: BrowserEvent) -> EventSeq;

    /// Live feed of events published after this call
    fn subscribe(&self) -> broadcast::Receiver<(EventSeq, BrowserEvent)>;

    /// Retained events numbered `seq` or later
    async fn events_from(&self, seq: EventSeq) -> Vec<(EventSeq, BrowserEvent)>;

    /// Retained events about one connection root
    async fn get_root_events(&self, root: &str) -> Vec<(EventSeq, BrowserEvent)>;

    /// Number the next published event will get
    fn current_seq(&self) -> EventSeq;
}
