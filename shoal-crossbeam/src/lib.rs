//! Crossbeam-based reclamation for shoal skip lists.
//!
//! This crate provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation.
//!
//! # Usage
//!
//! ```ignore
//! use shoal_core::SkipList;
//! use shoal_crossbeam::EpochGuard;
//!
//! let list: SkipList<i32, String, EpochGuard> = SkipList::unique();
//! list.insert(42, "answer".to_string(), false)?;
//! ```

pub mod epoch_guard;

pub use epoch_guard::{EpochArenaSkipList, EpochGuard, EpochSkipList};
