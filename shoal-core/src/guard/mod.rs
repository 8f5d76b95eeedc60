//! Guard trait for memory reclamation strategies.
//!
//! Skip-list nodes and value cells that are unlinked from a live list may
//! still be visited by lock-free readers that started their descent before
//! the unlink. The `Guard` trait decides when such memory is actually freed.
//!
//! # Design
//!
//! ```text
//! SkipList<K, V, G: Guard, S: NodeStore>
//!     │
//!     ├── SkipList<K, V, EpochGuard>      (production, shoal-crossbeam)
//!     └── SkipList<K, V, DeferredGuard>   (testing)
//! ```
//!
//! Every public operation pins a read guard before touching a node, and every
//! unlinked node or value cell is handed to the list's stored guard through
//! `defer_destroy`.

mod deferred_guard;

pub use deferred_guard::DeferredGuard;

/// A memory reclamation guard that protects concurrent access to nodes.
///
/// # Safety Contract
///
/// Implementations must ensure that pointers passed to `defer_destroy` are not
/// destroyed while any `ReadGuard` pinned before the call is still alive.
///
/// Guards are stored in lists and must be `Send + Sync`. Thread pinning (for
/// epoch-based guards) happens per operation, not when the guard is created.
///
pub trait Guard: Sized + Default + Send + Sync {
    /// An active guard that protects reads for its lifetime.
    ///
    /// For epoch-based guards, this holds a pinned `crossbeam_epoch::Guard`.
    /// For deferred guards, this is `()` since protection is provided by the
    /// list's stored guard.
    ///
    type ReadGuard: Sized;

    /// Pin an active read guard.
    ///
    fn pin() -> Self::ReadGuard;

    /// Schedule a pointer for deferred destruction.
    ///
    /// # Safety
    ///
    /// - `ptr` must be valid and no longer reachable from the list
    /// - `destroy` must be the correct destruction function for `ptr`
    /// - `ptr` must not be retired twice
    ///
    unsafe fn defer_destroy<N>(&self, ptr: *mut N, destroy: unsafe fn(*mut N));
}

/// Destruction function for pointers created with `Box::into_raw`.
///
/// # Safety
/// `ptr` must come from `Box::into_raw` and must not be used afterwards.
pub(crate) unsafe fn drop_boxed<T>(ptr: *mut T) {
    unsafe { drop(Box::from_raw(ptr)) };
}
