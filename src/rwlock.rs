//! Per-node reader-writer guard.
//!
//! Every queue in the tree owns exactly one [`NodeLock`] that guards its own
//! child list and its own aggregate fields. There is no tree-wide lock, so
//! operations on disjoint subtrees never contend.
//!
//! # Lock ordering
//!
//! Locks are always acquired **top-down**: a parent may hold its own guard
//! while it calls into a child (which then takes the child's guard), but a
//! child must never take a write guard on an ancestor while it is being
//! visited. Recursive passes (`update_demand`, `recompute_shares`,
//! `assign_container`, ...) rely on this to stay deadlock-free.
//!
//! # Reentrancy
//!
//! Read guards are taken with `parking_lot`'s recursive read, so a thread
//! that already holds a read guard on a node may take another one on the same
//! node even while a writer is queued. Write guards are not reentrant.
//!
//! # Examples
//!
//! ```
//! use prometheus_fair_queues::rwlock::NodeLock;
//!
//! let lock = NodeLock::new(vec![1, 2]);
//! {
//!     let outer = lock.read();
//!     let inner = lock.read(); // reentrant read
//!     assert_eq!(outer.len(), inner.len());
//! }
//! lock.write().push(3);
//! assert_eq!(lock.snapshot(), vec![1, 2, 3]);
//! ```

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Reader-writer guard protecting one queue node's own state.
#[derive(Debug, Default)]
pub struct NodeLock<T> {
    inner: RwLock<T>,
}

impl<T> NodeLock<T> {
    /// Wrap `value` in a new node lock.
    pub const fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Acquire a shared guard. Reentrant for the calling thread.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read_recursive()
    }

    /// Acquire the exclusive guard.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    /// Try to acquire a shared guard without blocking.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.inner.try_read_recursive()
    }

    /// Try to acquire the exclusive guard without blocking.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.inner.try_write()
    }

    /// Consume the lock and return the guarded value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Clone> NodeLock<T> {
    /// Point-in-time copy of the guarded value taken under a read guard.
    pub fn snapshot(&self) -> T {
        self.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_read_write() {
        let lock = NodeLock::new(0);
        assert_eq!(*lock.read(), 0);
        *lock.write() = 42;
        assert_eq!(*lock.read(), 42);
    }

    #[test]
    fn test_reentrant_read_with_waiting_writer() {
        let lock = Arc::new(NodeLock::new(5));
        let outer = lock.read();

        let writer_lock = Arc::clone(&lock);
        let writer = thread::spawn(move || {
            *writer_lock.write() += 1;
        });

        // Give the writer time to park behind the outer guard.
        thread::sleep(Duration::from_millis(20));

        // A plain fair read would block behind the queued writer here.
        let inner = lock.read();
        assert_eq!(*inner, 5);
        drop(inner);
        drop(outer);

        writer.join().unwrap();
        assert_eq!(*lock.read(), 6);
    }

    #[test]
    fn test_write_excludes_readers() {
        let lock = NodeLock::new(1);
        let w = lock.write();
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(w);
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let lock = NodeLock::new(vec!["a".to_string()]);
        let snap = lock.snapshot();
        lock.write().push("b".to_string());
        assert_eq!(snap, vec!["a".to_string()]);
        assert_eq!(lock.read().len(), 2);
    }

    #[test]
    fn test_concurrent_writers() {
        let lock = Arc::new(NodeLock::new(0u32));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..100 {
                        *lock.write() += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(Arc::try_unwrap(lock).unwrap().into_inner(), 800);
    }
}
