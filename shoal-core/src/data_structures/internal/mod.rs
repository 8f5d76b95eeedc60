//! Internal implementation details.
//!
//! Everything here except the level randomizer is pub(crate).

pub(crate) mod aux_path;
pub mod level;
pub(crate) mod node_flags;

pub use level::random_level;
