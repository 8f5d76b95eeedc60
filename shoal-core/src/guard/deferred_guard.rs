//! Deferred guard implementation for testing.
//!
//! This module provides `DeferredGuard`, a simple guard implementation that
//! defers all destruction until the guard is dropped.

#[cfg(debug_assertions)]
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use super::Guard;

/// A simple guard that defers all destruction until the guard is dropped.
///
/// The guard lives inside the skip list, so everything retired during the
/// list's lifetime is freed when the list itself is dropped. Useful for tests
/// where predictable destruction timing matters; memory accumulates in
/// long-running use.
///
/// # Thread Safety
///
/// Retired pointers from any thread are collected behind a `Mutex`.
///
pub struct DeferredGuard {
    deferred: Mutex<Vec<DeferredPtr>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct DeferredPtr {
    ptr: *mut (),
    destroy: unsafe fn(*mut ()),
}

// Safety: DeferredPtr only carries the pointer and its destruction function,
// access is serialized via the Mutex
unsafe impl Send for DeferredPtr {}

impl DeferredGuard {
    /// Create a new deferred guard.
    pub fn new() -> Self {
        DeferredGuard {
            deferred: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Number of pointers waiting for destruction.
    pub fn pending(&self) -> usize {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        let deferred = self
            .deferred
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        for entry in deferred.drain(..) {
            unsafe {
                (entry.destroy)(entry.ptr);
            }
        }
    }
}

impl Guard for DeferredGuard {
    /// No-op: retired memory is protected until the stored guard drops.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {}

    unsafe fn defer_destroy<N>(&self, ptr: *mut N, destroy: unsafe fn(*mut N)) {
        #[cfg(debug_assertions)]
        {
            let addr = ptr as usize;
            let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
            if !seen.insert(addr) {
                panic!("pointer {:#x} retired twice", addr);
            }
        }

        let entry = DeferredPtr {
            ptr: ptr as *mut (),
            destroy: unsafe {
                std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(destroy)
            },
        };
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}
