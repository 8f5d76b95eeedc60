//! Reusable traversal buffers.
//!
//! Every insert and remove records one predecessor and one successor per
//! level. The buffers are pooled per list in a lock-free `SegQueue` so hot
//! paths do not allocate; a `PooledPath` resets itself and goes back to the
//! pool when dropped.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr;

use crossbeam::queue::SegQueue;

use crate::config::MAX_LEVEL;

/// Predecessor and successor per level, `2 * MAX_LEVEL` slots in total.
pub(crate) struct AuxPath<N> {
    preds: [*mut N; MAX_LEVEL],
    succs: [*mut N; MAX_LEVEL],
}

// Safety: the path holds plain addresses and is reset before it is pooled,
// so no thread dereferences another thread's recorded nodes
unsafe impl<N> Send for AuxPath<N> {}

impl<N> AuxPath<N> {
    fn new() -> Self {
        AuxPath {
            preds: [ptr::null_mut(); MAX_LEVEL],
            succs: [ptr::null_mut(); MAX_LEVEL],
        }
    }

    fn reset(&mut self) {
        self.preds.fill(ptr::null_mut());
        self.succs.fill(ptr::null_mut());
    }

    #[inline]
    pub(crate) fn record(&mut self, level: usize, pred: *mut N, succ: *mut N) {
        self.preds[level] = pred;
        self.succs[level] = succ;
    }

    #[inline]
    pub(crate) fn pred(&self, level: usize) -> *mut N {
        self.preds[level]
    }

    #[inline]
    pub(crate) fn succ(&self, level: usize) -> *mut N {
        self.succs[level]
    }
}

pub(crate) struct AuxPathPool<N> {
    idle: SegQueue<Box<AuxPath<N>>>,
    limit: usize,
}

impl<N> AuxPathPool<N> {
    pub(crate) fn new(limit: usize) -> Self {
        AuxPathPool {
            idle: SegQueue::new(),
            limit,
        }
    }

    pub(crate) fn acquire(&self) -> PooledPath<'_, N> {
        let path = self.idle.pop().unwrap_or_else(|| Box::new(AuxPath::new()));
        PooledPath {
            path: ManuallyDrop::new(path),
            pool: self,
        }
    }

    pub(crate) fn idle(&self) -> usize {
        self.idle.len()
    }
}

pub(crate) struct PooledPath<'a, N> {
    path: ManuallyDrop<Box<AuxPath<N>>>,
    pool: &'a AuxPathPool<N>,
}

impl<N> Deref for PooledPath<'_, N> {
    type Target = AuxPath<N>;

    fn deref(&self) -> &Self::Target {
        &self.path
    }
}

impl<N> DerefMut for PooledPath<'_, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.path
    }
}

impl<N> Drop for PooledPath<'_, N> {
    fn drop(&mut self) {
        let mut path = unsafe { ManuallyDrop::take(&mut self.path) };
        if self.pool.idle.len() < self.pool.limit {
            path.reset();
            self.pool.idle.push(path);
        }
    }
}
