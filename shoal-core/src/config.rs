//! Skip list configuration.
//!
//! A `SkipListConfig` is fixed at construction: the value mode, level cap,
//! capacity ceiling, lock backend and (for arena lists) arena sizing all hold
//! for the lifetime of the list.

use crate::data_structures::internal::level::random_level;
use crate::data_structures::sorted::arena::ArenaSize;
use crate::error::{Result, SkipListError};

/// Static cap on node levels.
pub const MAX_LEVEL: usize = 32;

/// Level randomizer: `(max_level, current_elements) -> level in 1..=max_level`.
pub type LevelFn = fn(usize, u64) -> usize;

const DEFAULT_PATH_POOL_LIMIT: usize = 64;

/// How values are stored under one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueMode {
    /// One value per key. Inserting an existing key replaces the value.
    Unique,
    /// Any number of values per key, kept in insertion order.
    DuplicateList,
    /// Any number of values per key, kept ordered by the value comparator.
    /// Values comparing equal are all kept, in insertion order.
    DuplicateOrdered,
}

impl ValueMode {
    #[inline]
    pub fn allows_duplicates(self) -> bool {
        !matches!(self, ValueMode::Unique)
    }
}

/// Backend used by per-node locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockBackend {
    /// Token CAS with exponential backoff escalating to `thread::yield_now`.
    #[default]
    Spin,
    /// OS mutex + condvar. The token is ignored.
    Blocking,
}

#[derive(Debug, Clone, Copy)]
pub struct SkipListConfig {
    pub(crate) value_mode: ValueMode,
    pub(crate) max_level: usize,
    pub(crate) max_elements: i64,
    pub(crate) lock_backend: LockBackend,
    pub(crate) arena: ArenaSize,
    pub(crate) level_fn: LevelFn,
    pub(crate) path_pool_limit: usize,
}

impl SkipListConfig {
    pub fn new(value_mode: ValueMode) -> Self {
        SkipListConfig {
            value_mode,
            max_level: MAX_LEVEL,
            max_elements: i64::MAX,
            lock_backend: LockBackend::default(),
            arena: ArenaSize::default(),
            level_fn: random_level,
            path_pool_limit: DEFAULT_PATH_POOL_LIMIT,
        }
    }

    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    /// Capacity ceiling on linked nodes (distinct keys). Values added to a
    /// key count as one node. Once the ceiling is reached every insert fails
    /// with `Full`. Checked optimistically, so heavy contention may overshoot
    /// it by a few nodes.
    pub fn with_max_elements(mut self, max_elements: i64) -> Self {
        self.max_elements = max_elements;
        self
    }

    pub fn with_lock_backend(mut self, lock_backend: LockBackend) -> Self {
        self.lock_backend = lock_backend;
        self
    }

    pub fn with_arena(mut self, arena: ArenaSize) -> Self {
        self.arena = arena;
        self
    }

    pub fn with_level_fn(mut self, level_fn: LevelFn) -> Self {
        self.level_fn = level_fn;
        self
    }

    pub fn with_path_pool_limit(mut self, limit: usize) -> Self {
        self.path_pool_limit = limit;
        self
    }

    pub fn value_mode(&self) -> ValueMode {
        self.value_mode
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    pub fn max_elements(&self) -> i64 {
        self.max_elements
    }

    pub fn lock_backend(&self) -> LockBackend {
        self.lock_backend
    }

    pub fn arena(&self) -> ArenaSize {
        self.arena
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_level == 0 || self.max_level > MAX_LEVEL {
            return Err(SkipListError::InvalidConfig("max_level must be in 1..=32"));
        }
        if self.max_elements <= 0 {
            return Err(SkipListError::InvalidConfig("max_elements must be positive"));
        }
        self.arena.to_policy().validate()?;
        Ok(())
    }
}

impl Default for SkipListConfig {
    fn default() -> Self {
        Self::new(ValueMode::Unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SkipListConfig::default();
        assert_eq!(config.value_mode(), ValueMode::Unique);
        assert_eq!(config.max_level(), MAX_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_levels_and_capacity() {
        let config = SkipListConfig::default().with_max_level(0);
        assert!(matches!(config.validate(), Err(SkipListError::InvalidConfig(_))));

        let config = SkipListConfig::default().with_max_level(MAX_LEVEL + 1);
        assert!(matches!(config.validate(), Err(SkipListError::InvalidConfig(_))));

        let config = SkipListConfig::default().with_max_elements(0);
        assert!(matches!(config.validate(), Err(SkipListError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_arena_policy() {
        let config = SkipListConfig::default().with_arena(ArenaSize::Custom {
            initial: 4096,
            max_chunk: 1024,
            cap: 8192,
        });
        assert!(matches!(config.validate(), Err(SkipListError::InvalidConfig(_))));
    }
}
