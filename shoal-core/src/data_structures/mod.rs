//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`sorted`] - The skip list, its nodes and node stores
//! - `values` - Per-key value containers (unique, list, ordered)
//! - `internal` - Level randomizer, node flags and traversal buffers

pub(crate) mod internal;
pub mod sorted;
pub(crate) mod values;

pub mod element;

pub use element::Element;
pub use internal::random_level;
pub use sorted::{
    Arena, ArenaError, ArenaPolicy, ArenaSize, ArenaSkipList, ArenaStore, HeapStore, Iter,
    NodeStore, SkipList,
};
