//! In-memory EventBus implementation
//!
//! Keeps a bounded replay window next to a broadcast channel. Once the
//! window is full the oldest events fall off; sequence numbers keep counting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};

use super::BrowserEvent;
use super::bus::{EventBus, EventSeq};

/// In-memory implementation of EventBus
pub struct MemoryEventBus {
    retained: RwLock<VecDeque<(EventSeq, BrowserEvent)>>,
    next_seq: AtomicU64,
    capacity: usize,
    tx: broadcast::Sender<(EventSeq, BrowserEvent)>,
}

impl MemoryEventBus {
    /// Create a bus retaining up to `capacity` events for replay
    ///
    /// The same capacity bounds how far a live subscriber may lag.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            retained: RwLock::new(VecDeque::with_capacity(capacity)),
            next_seq: AtomicU64::new(0),
            capacity,
            tx,
        }
    }

    /// Oldest sequence number still available for replay
    pub async fn oldest_seq(&self) -> Option<EventSeq> {
        self.retained.read().await.front().map(|(seq, _)| *seq)
    }

    async fn retained_where(
        &self,
        keep: impl Fn(&(EventSeq, BrowserEvent)) -> bool,
    ) -> Vec<(EventSeq, BrowserEvent)> {
        self.retained
            .read()
            .await
            .iter()
            .filter(|entry| keep(entry))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: BrowserEvent) -> EventSeq {
        let mut retained = self.retained.write().await;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        if retained.len() == self.capacity {
            retained.pop_front();
        }
        retained.push_back((seq, event.clone()));

        // Send while still holding the lock so subscribers see seq order
        let _ = self.tx.send((seq, event));
        seq
    }

    fn subscribe(&self) -> broadcast::Receiver<(EventSeq, BrowserEvent)> {
        self.tx.subscribe()
    }

    async fn events_from(&self, seq: EventSeq) -> Vec<(EventSeq, BrowserEvent)> {
        self.retained_where(|(s, _)| *s >= seq).await
    }

    async fn get_root_events(&self, root: &str) -> Vec<(EventSeq, BrowserEvent)> {
        self.retained_where(|(_, event)| event.root() == root).await
    }

    fn current_seq(&self) -> EventSeq {
        self.next_seq.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::SessionStatus;

    fn status(root: &str) -> BrowserEvent {
        BrowserEvent::SessionStatusChanged {
            root: root.to_string(),
            status: SessionStatus::Disconnected,
        }
    }

    // ==================== Publish Tests ====================

    #[tokio::test]
    async fn publish_increments_sequence_number() {
        let bus = MemoryEventBus::new(100);

        assert_eq!(bus.publish(status("a")).await, 0);
        assert_eq!(bus.publish(status("b")).await, 1);
        assert_eq!(bus.publish(status("c")).await, 2);
        assert_eq!(bus.current_seq(), 3);
    }

    // ==================== Subscribe Tests ====================

    #[tokio::test]
    async fn subscribe_receives_new_events_in_order() {
        let bus = MemoryEventBus::new(100);
        let mut rx = bus.subscribe();

        bus.publish(status("a")).await;
        bus.publish(status("b")).await;

        let (seq1, first) = rx.recv().await.unwrap();
        let (seq2, _) = rx.recv().await.unwrap();
        assert_eq!(seq1, 0);
        assert_eq!(seq2, 1);
        assert_eq!(first.root(), "a");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_events() {
        let bus = MemoryEventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(status("a")).await;

        assert_eq!(rx1.recv().await.unwrap().0, 0);
        assert_eq!(rx2.recv().await.unwrap().0, 0);
    }

    // ==================== Replay Tests ====================

    #[tokio::test]
    async fn events_from_returns_events_starting_at_seq() {
        let bus = MemoryEventBus::new(100);
        for root in ["a", "b", "c"] {
            bus.publish(status(root)).await;
        }

        let events = bus.events_from(1).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, 1);
        assert!(bus.events_from(100).await.is_empty());
    }

    #[tokio::test]
    async fn get_root_events_filters_by_root() {
        let bus = MemoryEventBus::new(100);
        bus.publish(status("dev")).await;
        bus.publish(status("prod")).await;
        bus.publish(status("dev")).await;

        assert_eq!(bus.get_root_events("dev").await.len(), 2);
        assert_eq!(bus.get_root_events("prod").await.len(), 1);
        assert!(bus.get_root_events("unknown").await.is_empty());
    }

    #[tokio::test]
    async fn replay_window_drops_oldest_events() {
        let bus = MemoryEventBus::new(2);
        for root in ["a", "b", "c"] {
            bus.publish(status(root)).await;
        }

        let events = bus.events_from(0).await;
        assert_eq!(events.iter().map(|(seq, _)| *seq).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(bus.oldest_seq().await, Some(1));
        assert_eq!(bus.current_seq(), 3);
    }

    // ==================== Concurrent Access Tests ====================

    #[tokio::test]
    async fn concurrent_publish_maintains_sequence_integrity() {
        let bus = Arc::new(MemoryEventBus::new(1000));
        let mut handles = vec![];

        for i in 0..10 {
            let bus = Arc::clone(&bus);
            handles.push(tokio::spawn(async move {
                for j in 0..10 {
                    bus.publish(status(&format!("r{}-{}", i, j))).await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let seqs: Vec<_> = bus
            .events_from(0)
            .await
            .iter()
            .map(|(seq, _)| *seq)
            .collect();
        assert_eq!(seqs, (0..100u64).collect::<Vec<_>>());
    }
}
