pub mod comparator;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod guard;
pub mod preemptive_synchronization;

// Re-export the main types for convenience
pub use comparator::{Comparator, NaturalOrder};
pub use config::{LevelFn, LockBackend, MAX_LEVEL, SkipListConfig, ValueMode};
pub use data_structures::{
    ArenaSize, ArenaSkipList, ArenaStore, Element, HeapStore, NodeStore, SkipList, random_level,
};
pub use error::{Result, SkipListError};
pub use guard::{DeferredGuard, Guard};
pub use preemptive_synchronization::VersionTokens;
