//! Shared/exclusive lock guarding file-handle lifecycles.
//!
//! Opening, creating, syncing and closing a file take the lock exclusively;
//! every other operation that touches an open handle takes it shared. A close
//! therefore never interleaves with an open that is still completing, nor
//! with a read or write in flight on another worker.
//!
//! One lock per [`EventLoop`](crate::EventLoop) is enough. It is an explicit
//! value threaded through construction so tests can inject their own.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cloneable handle to one shared/exclusive lock. Clones refer to the same lock.
#[derive(Clone, Default)]
pub struct FileLifecycleLock {
    inner: Arc<RwLock<()>>,
}

impl FileLifecycleLock {
    /// Creates a new, unlocked lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock can be held shared.
    pub fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.read()
    }

    /// Blocks until the lock can be held exclusively.
    pub fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.write()
    }

    /// Returns `true` if both handles refer to the same lock.
    pub fn same_lock(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` if the lock is currently held exclusively.
    pub fn is_held_exclusive(&self) -> bool {
        self.inner.is_locked_exclusive()
    }
}

impl fmt::Debug for FileLifecycleLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLifecycleLock")
            .field("locked", &self.inner.is_locked())
            .field("exclusive", &self.inner.is_locked_exclusive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_lock() {
        let lock = FileLifecycleLock::new();
        let other = lock.clone();
        assert!(lock.same_lock(&other));
        assert!(!lock.same_lock(&FileLifecycleLock::new()));

        let guard = lock.exclusive();
        assert!(other.is_held_exclusive());
        drop(guard);
        assert!(!other.is_held_exclusive());
    }

    #[test]
    fn shared_guards_coexist() {
        let lock = FileLifecycleLock::new();
        let a = lock.shared();
        let b = lock.shared();
        assert!(!lock.is_held_exclusive());
        drop((a, b));
    }
}
