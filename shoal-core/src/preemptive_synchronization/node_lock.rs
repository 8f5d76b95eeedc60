//! Per-node optimistic locks.
//!
//! A node lock guards one node's forward pointers (and its value container)
//! while they are rewired. Ownership is recorded as a version token drawn
//! from [`VersionTokens`](super::VersionTokens):
//!
//! ```text
//!   owner == UNLOCKED ──lock(t)──► owner == t ──unlock(t)──► owner == UNLOCKED
//!                                      │
//!                                      └──unlock(t')──► refused (stale token)
//! ```
//!
//! Two backends share the [`OptimisticLock`] interface:
//!
//! - [`SpinLock`]: CAS from `UNLOCKED` to the token, exponential pause
//!   escalating to `thread::yield_now` while contended.
//! - [`BlockingLock`]: mutex + condvar, ignores the token.
//!
//! [`NodeLock`] selects the backend per list, so call sites never change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

use crossbeam::utils::Backoff;

use super::version_token::UNLOCKED;
use crate::config::LockBackend;

pub trait OptimisticLock {
    /// Block until the lock is owned by `token`.
    fn lock(&self, token: u64);

    /// Single non-blocking acquisition attempt.
    #[must_use]
    fn try_lock(&self, token: u64) -> bool;

    /// Release the lock. Returns `false` if `token` does not own it.
    fn unlock(&self, token: u64) -> bool;

    fn is_locked(&self) -> bool;
}

// ============================================================================
// SpinLock
// ============================================================================

#[derive(Debug, Default)]
pub struct SpinLock {
    owner: AtomicU64,
}

impl SpinLock {
    pub const fn new() -> Self {
        SpinLock {
            owner: AtomicU64::new(UNLOCKED),
        }
    }

    pub fn owner(&self) -> u64 {
        self.owner.load(Ordering::Acquire)
    }
}

impl OptimisticLock for SpinLock {
    fn lock(&self, token: u64) {
        debug_assert_ne!(token, UNLOCKED);
        let backoff = Backoff::new();
        let mut reported = false;

        loop {
            if self.try_lock(token) {
                return;
            }

            if backoff.is_completed() && !reported {
                reported = true;
                tracing::warn!(
                    lock_ptr = ?std::ptr::from_ref(self),
                    token,
                    owner = self.owner.load(Ordering::Relaxed),
                    "SLOW_LOCK: node lock still contended after spin budget, yielding"
                );
            }
            backoff.snooze();
        }
    }

    #[inline]
    fn try_lock(&self, token: u64) -> bool {
        // Relaxed pre-check keeps contended waiters off the cache line
        if self.owner.load(Ordering::Relaxed) != UNLOCKED {
            return false;
        }
        self.owner
            .compare_exchange(UNLOCKED, token, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    fn unlock(&self, token: u64) -> bool {
        self.owner
            .compare_exchange(token, UNLOCKED, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Acquire) != UNLOCKED
    }
}

// ============================================================================
// BlockingLock
// ============================================================================

#[derive(Debug, Default)]
pub struct BlockingLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl BlockingLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptimisticLock for BlockingLock {
    fn lock(&self, _token: u64) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    fn try_lock(&self, _token: u64) -> bool {
        let mut held = match self.held.try_lock() {
            Ok(held) => held,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return false,
        };
        if *held {
            return false;
        }
        *held = true;
        true
    }

    fn unlock(&self, _token: u64) -> bool {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !*held {
            return false;
        }
        *held = false;
        drop(held);
        self.released.notify_one();
        true
    }

    fn is_locked(&self) -> bool {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// NodeLock
// ============================================================================

/// The lock embedded in every skip-list node.
#[derive(Debug)]
pub enum NodeLock {
    Spin(SpinLock),
    Blocking(BlockingLock),
}

impl NodeLock {
    pub fn new(backend: LockBackend) -> Self {
        match backend {
            LockBackend::Spin => NodeLock::Spin(SpinLock::new()),
            LockBackend::Blocking => NodeLock::Blocking(BlockingLock::new()),
        }
    }
}

impl OptimisticLock for NodeLock {
    #[inline]
    fn lock(&self, token: u64) {
        match self {
            NodeLock::Spin(lock) => lock.lock(token),
            NodeLock::Blocking(lock) => lock.lock(token),
        }
    }

    #[inline]
    fn try_lock(&self, token: u64) -> bool {
        match self {
            NodeLock::Spin(lock) => lock.try_lock(token),
            NodeLock::Blocking(lock) => lock.try_lock(token),
        }
    }

    #[inline]
    fn unlock(&self, token: u64) -> bool {
        match self {
            NodeLock::Spin(lock) => lock.unlock(token),
            NodeLock::Blocking(lock) => lock.unlock(token),
        }
    }

    fn is_locked(&self) -> bool {
        match self {
            NodeLock::Spin(lock) => lock.is_locked(),
            NodeLock::Blocking(lock) => lock.is_locked(),
        }
    }
}
