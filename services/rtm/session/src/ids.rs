//! Outbound frame id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing frame ids, starting at 1
#[derive(Debug)]
pub struct MessageIdAllocator {
    next: AtomicU64,
}

impl MessageIdAllocator {
    /// Create an allocator whose first id is 1
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Take the next id. Called exactly once per outbound frame.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next call to [`next_id`](Self::next_id) will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Start over at 1 for a new session
    pub fn reset(&self) {
        self.next.store(1, Ordering::SeqCst);
    }
}

impl Default for MessageIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_start_at_one() {
        let ids = MessageIdAllocator::new();
        let taken: Vec<u64> = (0..5).map(|_| ids.next_id()).collect();
        assert_eq!(taken, vec![1, 2, 3, 4, 5]);
        assert_eq!(ids.peek(), 6);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let ids = MessageIdAllocator::new();
        ids.next_id();
        ids.next_id();
        ids.reset();
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = Arc::new(MessageIdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let batch = handle.join().unwrap();
            // Each thread observes its own ids in increasing order
            assert!(batch.windows(2).all(|w| w[0] < w[1]));
            seen.extend(batch);
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(seen.iter().min(), Some(&1));
        assert_eq!(seen.iter().max(), Some(&1000));
    }
}
