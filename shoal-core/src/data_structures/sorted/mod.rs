//! Sorted concurrent collections.
//!
//! - [`SkipList`] - lazy skip list with per-node optimistic locks, one node
//!   per key and a value container per node
//! - [`NodeStore`] - where nodes are allocated: [`HeapStore`] or
//!   [`ArenaStore`] (bump [`Arena`])

pub mod arena;
pub mod node_store;
pub(crate) mod skip_node;
pub mod skip_list;

pub use arena::{Arena, ArenaError, ArenaPolicy, ArenaSize};
pub use node_store::{ArenaStore, HeapStore, NodeStore};
pub use skip_list::{ArenaSkipList, Iter, SkipList};
