//! Process-wide message ID counters

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Atomic, shareable ID counter. Clones share the same sequence.
#[derive(Debug, Clone)]
pub struct MessageIdCounter(Arc<AtomicU32>);

impl MessageIdCounter {
    pub fn new(initial: u32) -> Self {
        Self(Arc::new(AtomicU32::new(initial)))
    }

    /// Take the next ID. Wraps at `u32::MAX`.
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// The ID the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters shared by every connection of one reader.
///
/// Outbound reader messages draw from `message_ids`; KEEPALIVE messages draw
/// from their own `keepalive_ids` sequence.
#[derive(Debug, Clone)]
pub struct Session {
    pub message_ids: MessageIdCounter,
    pub keepalive_ids: MessageIdCounter,
}

impl Session {
    pub fn new(initial_message_id: u32, initial_keepalive_id: u32) -> Self {
        Self {
            message_ids: MessageIdCounter::new(initial_message_id),
            keepalive_ids: MessageIdCounter::new(initial_keepalive_id),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(1000, 80000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn clones_share_one_sequence() {
        let a = MessageIdCounter::new(1000);
        let b = a.clone();
        assert_eq!(a.next(), 1000);
        assert_eq!(b.next(), 1001);
        assert_eq!(a.peek(), 1002);
    }

    #[test]
    fn wraps_instead_of_panicking() {
        let counter = MessageIdCounter::new(u32::MAX);
        assert_eq!(counter.next(), u32::MAX);
        assert_eq!(counter.next(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ids_are_unique() {
        let session = Session::default();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ids = session.message_ids.clone();
            handles.push(tokio::spawn(async move { (0..500).map(|_| ids.next()).collect::<Vec<_>>() }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "duplicate message id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
        assert_eq!(session.keepalive_ids.peek(), 80000);
    }
}
