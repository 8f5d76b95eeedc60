// Node flag word.
//
// Bit layout:
//   Bit 0:    HEAD      - node is the head sentinel
//   Bit 1:    INSERTED  - every level is wired, readers may use the node
//   Bit 2:    REMOVING  - a remove owns the node (transient or terminal)
//   Bits 3-4: value mode tag
//
// A node is live for readers when INSERTED is set and REMOVING is clear.
// REMOVING is cleared again when a remove leaves values behind; once the
// last value is gone it stays set for the rest of the node's life.
//
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::ValueMode;

const HEAD: u32 = 1 << 0;
const INSERTED: u32 = 1 << 1;
const REMOVING: u32 = 1 << 2;

const MODE_SHIFT: u32 = 3;
const MODE_MASK: u32 = 0b11 << MODE_SHIFT;

const MODE_UNIQUE: u32 = 0;
const MODE_LIST: u32 = 1;
const MODE_ORDERED: u32 = 2;

#[derive(Debug)]
pub(crate) struct NodeFlags {
    bits: AtomicU32,
}

impl NodeFlags {
    // =========================================================================
    // Construction
    // =========================================================================

    pub(crate) fn new(mode: ValueMode) -> Self {
        NodeFlags {
            bits: AtomicU32::new(Self::mode_bits(mode)),
        }
    }

    pub(crate) fn head() -> Self {
        NodeFlags {
            bits: AtomicU32::new(HEAD | INSERTED | Self::mode_bits(ValueMode::Unique)),
        }
    }

    #[inline]
    fn mode_bits(mode: ValueMode) -> u32 {
        let tag = match mode {
            ValueMode::Unique => MODE_UNIQUE,
            ValueMode::DuplicateList => MODE_LIST,
            ValueMode::DuplicateOrdered => MODE_ORDERED,
        };
        tag << MODE_SHIFT
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    #[inline]
    pub(crate) fn is_head(&self) -> bool {
        self.bits.load(Ordering::Relaxed) & HEAD != 0
    }

    #[inline]
    pub(crate) fn is_inserted(&self) -> bool {
        self.bits.load(Ordering::Acquire) & INSERTED != 0
    }

    #[inline]
    pub(crate) fn is_removing(&self) -> bool {
        self.bits.load(Ordering::Acquire) & REMOVING != 0
    }

    /// INSERTED and not REMOVING, read from a single snapshot of the word.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.bits.load(Ordering::Acquire) & (INSERTED | REMOVING) == INSERTED
    }

    /// Decode the value mode tag.
    ///
    /// Panics on an unknown tag: the flag word is corrupted.
    pub(crate) fn value_mode(&self) -> ValueMode {
        match (self.bits.load(Ordering::Relaxed) & MODE_MASK) >> MODE_SHIFT {
            MODE_UNIQUE => ValueMode::Unique,
            MODE_LIST => ValueMode::DuplicateList,
            MODE_ORDERED => ValueMode::DuplicateOrdered,
            tag => panic!("unknown value mode tag {:#x} in node flags", tag),
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    #[inline]
    pub(crate) fn mark_inserted(&self) {
        self.bits.fetch_or(INSERTED, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_removing(&self) {
        self.bits.fetch_or(REMOVING, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn clear_removing(&self) {
        self.bits.fetch_and(!REMOVING, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let flags = NodeFlags::new(ValueMode::DuplicateList);
        assert!(!flags.is_head());
        assert!(!flags.is_inserted());
        assert!(!flags.is_live());

        flags.mark_inserted();
        assert!(flags.is_live());

        flags.set_removing();
        assert!(flags.is_inserted());
        assert!(flags.is_removing());
        assert!(!flags.is_live());

        flags.clear_removing();
        assert!(flags.is_live());
        assert_eq!(flags.value_mode(), ValueMode::DuplicateList);
    }

    #[test]
    fn test_mode_tags_round_trip() {
        for mode in [
            ValueMode::Unique,
            ValueMode::DuplicateList,
            ValueMode::DuplicateOrdered,
        ] {
            assert_eq!(NodeFlags::new(mode).value_mode(), mode);
        }
    }

    #[test]
    fn test_head_is_live() {
        let flags = NodeFlags::head();
        assert!(flags.is_head());
        assert!(flags.is_live());
    }

    #[test]
    #[should_panic(expected = "unknown value mode tag")]
    fn test_corrupted_mode_panics() {
        let flags = NodeFlags::new(ValueMode::Unique);
        flags.bits.fetch_or(MODE_MASK, Ordering::Relaxed);
        flags.value_mode();
    }
}
