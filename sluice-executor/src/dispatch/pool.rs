//! Free-slot index pool.

use parking_lot::{Condvar, Mutex};

struct Ring {
    /// One spare position so `get == put` unambiguously means empty.
    slots: Vec<usize>,
    get: usize,
    put: usize,
}

impl Ring {
    fn seeded(size: usize) -> Self {
        let mut slots = vec![0; size + 1];
        for (i, slot) in slots.iter_mut().enumerate().take(size) {
            *slot = i;
        }
        Self {
            slots,
            get: 0,
            put: size,
        }
    }

    fn is_empty(&self) -> bool {
        self.get == self.put
    }

    fn pop(&mut self) -> usize {
        let index = self.slots[self.get];
        self.get = (self.get + 1) % self.slots.len();
        index
    }

    fn push(&mut self, index: usize) {
        self.slots[self.put] = index;
        self.put = (self.put + 1) % self.slots.len();
    }
}

/// A fixed-capacity concurrent ring buffer of free slot indices.
///
/// A pool of capacity N starts holding the indices `0..N`. `get` takes
/// the oldest released index, blocking while the pool is empty (or
/// returning `None` immediately under `nowait`); `put` appends a released
/// index and wakes one waiter. Waiters are served as slots free up; the
/// ring's FIFO order prevents starvation.
pub struct IndexPool {
    ring: Mutex<Ring>,
    available: Condvar,
}

impl IndexPool {
    /// Create a pool holding the indices `0..size`.
    pub fn new(size: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::seeded(size)),
            available: Condvar::new(),
        }
    }

    /// Reinitialize to a full pool of `0..size`. Outstanding indices are
    /// forgotten; only safe while no slot is checked out.
    pub fn resize(&self, size: usize) {
        *self.ring.lock() = Ring::seeded(size);
    }

    /// Take a free index, blocking while none is available.
    ///
    /// With `nowait`, returns `None` immediately instead of blocking.
    pub fn get(&self, nowait: bool) -> Option<usize> {
        let mut ring = self.ring.lock();
        while ring.is_empty() {
            if nowait {
                return None;
            }
            self.available.wait(&mut ring);
        }
        Some(ring.pop())
    }

    /// Return an index to the pool and wake one waiter.
    pub fn put(&self, index: usize) {
        let mut ring = self.ring.lock();
        ring.push(index);
        self.available.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn capacity_gets_succeed_then_nowait_fails() {
        let pool = IndexPool::new(3);
        assert_eq!(pool.get(true), Some(0));
        assert_eq!(pool.get(true), Some(1));
        assert_eq!(pool.get(true), Some(2));
        assert_eq!(pool.get(true), None);
    }

    #[test]
    fn put_makes_index_available_again() {
        let pool = IndexPool::new(1);
        assert_eq!(pool.get(true), Some(0));
        pool.put(0);
        assert_eq!(pool.get(true), Some(0));
    }

    #[test]
    fn released_indices_come_back_oldest_first() {
        let pool = IndexPool::new(2);
        assert_eq!(pool.get(true), Some(0));
        assert_eq!(pool.get(true), Some(1));
        pool.put(1);
        pool.put(0);
        assert_eq!(pool.get(true), Some(1));
        assert_eq!(pool.get(true), Some(0));
    }

    #[test]
    fn blocking_get_waits_for_put() {
        let pool = Arc::new(IndexPool::new(1));
        assert_eq!(pool.get(true), Some(0));

        let got = Arc::new(AtomicBool::new(false));
        let waiter = {
            let pool = Arc::clone(&pool);
            let got = Arc::clone(&got);
            thread::spawn(move || {
                let index = pool.get(false);
                got.store(true, Ordering::SeqCst);
                index
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!got.load(Ordering::SeqCst));

        pool.put(0);
        assert_eq!(waiter.join().unwrap(), Some(0));
        assert!(got.load(Ordering::SeqCst));
    }

    #[test]
    fn zero_capacity_pool_has_nothing() {
        let pool = IndexPool::new(0);
        assert_eq!(pool.get(true), None);
    }
}
