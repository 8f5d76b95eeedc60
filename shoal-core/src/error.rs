use thiserror::Error;

use crate::config::ValueMode;
use crate::data_structures::sorted::arena::ArenaError;

/// Errors returned by skip-list operations.
///
/// Every variant is a recoverable condition the caller can match on.
/// Broken internal invariants (a node whose value container disagrees with
/// the list's value mode) panic instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipListError {
    #[error("key not found")]
    NotFound,

    #[error("skip list is empty")]
    Empty,

    #[error("skip list is full")]
    Full,

    #[error("value replace disabled for an existing key")]
    ReplaceDisabled,

    /// A reader saw a node in transition. Transient, safe to retry.
    #[error("concurrent read observed a node in transition")]
    ConcurrentReadConflict,

    /// Another remove owns the node.
    #[error("node is concurrently being removed")]
    ConcurrentlyRemoving,

    #[error("operation requires a duplicate value mode, list is {0:?}")]
    UnsupportedValueMode(ValueMode),

    #[error("invalid skip list configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Arena(#[from] ArenaError),
}

pub type Result<T, E = SkipListError> = std::result::Result<T, E>;
