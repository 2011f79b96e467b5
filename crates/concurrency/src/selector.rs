//! Round-robin index selection over a fixed-size pool
//!
//! `CyclicSelector::next()` hands out `0, 1, .., N-1, 0, 1, ..` to concurrent
//! callers without serializing them in the common case.
//!
//! ## Locking
//!
//! ```text
//! fast path:  read lock -> fetch_add -> index < N -> return index
//! wrap path:  index >= N -> drop read lock -> write lock -> reset -> return 0
//! ```
//!
//! Many readers increment the counter concurrently under the shared lock.
//! Only the caller that runs past the end takes the exclusive lock, and while
//! it holds it no reader can increment, so the reset is never interleaved with
//! a fast-path increment. The counter is bounded by `N` plus the number of
//! callers racing on the wrap, so it never overflows.

use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Concurrency-safe round-robin index generator
#[derive(Debug)]
pub struct CyclicSelector {
    /// Pool size
    capacity: usize,
    /// Next index to hand out; may briefly exceed `capacity` before a wrap
    counter: AtomicUsize,
    /// Shared for increments, exclusive for the wraparound reset
    lock: RwLock<()>,
}

impl CyclicSelector {
    /// Create a selector for a pool of `capacity` members
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: capacity.get(),
            counter: AtomicUsize::new(0),
            lock: RwLock::new(()),
        }
    }

    /// Pool size this selector cycles over
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next index in `[0, capacity)`
    ///
    /// With a single member this is always 0 and touches neither the lock
    /// nor the counter.
    pub fn next(&self) -> usize {
        if self.capacity == 1 {
            return 0;
        }

        let index = {
            let _shared = self.lock.read();
            self.counter.fetch_add(1, Ordering::AcqRel)
        };
        if index < self.capacity {
            return index;
        }

        let _exclusive = self.lock.write();
        // Slot 0 is handed to us; the next caller starts at 1.
        self.counter.store(1, Ordering::Release);
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn selector(n: usize) -> CyclicSelector {
        CyclicSelector::new(NonZeroUsize::new(n).unwrap())
    }

    #[test]
    fn test_single_member_always_zero() {
        let s = selector(1);
        for _ in 0..1000 {
            assert_eq!(s.next(), 0);
        }
        // Fast path never touches the counter
        assert_eq!(s.counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_three_members_cycle() {
        let s = selector(3);
        let picks: Vec<usize> = (0..7).map(|_| s.next()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_counter_stays_bounded() {
        let s = selector(4);
        for _ in 0..100_000 {
            s.next();
        }
        assert!(s.counter.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn test_concurrent_picks_in_range() {
        let s = Arc::new(selector(5));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&s);
                thread::spawn(move || {
                    let mut seen = HashSet::new();
                    for _ in 0..10_000 {
                        let i = s.next();
                        assert!(i < 5);
                        seen.insert(i);
                    }
                    seen
                })
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        assert_eq!(all.len(), 5);
        assert!(s.counter.load(Ordering::SeqCst) <= 5 + 8);
    }

    proptest! {
        #[test]
        fn prop_first_n_picks_are_a_permutation(n in 2usize..64) {
            let s = selector(n);
            let picks: Vec<usize> = (0..n).map(|_| s.next()).collect();
            prop_assert_eq!(picks, (0..n).collect::<Vec<_>>());
            prop_assert_eq!(s.next(), 0);
        }

        #[test]
        fn prop_sequential_picks_are_modular(n in 1usize..16, calls in 1usize..200) {
            let s = selector(n);
            for i in 0..calls {
                prop_assert_eq!(s.next(), i % n);
            }
        }
    }
}
