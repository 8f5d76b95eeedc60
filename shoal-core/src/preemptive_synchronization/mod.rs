//! Thread-level synchronization primitives used by the skip list.

pub mod node_lock;
pub mod version_token;

pub use node_lock::{BlockingLock, NodeLock, OptimisticLock, SpinLock};
pub use version_token::{UNLOCKED, VersionTokens};
