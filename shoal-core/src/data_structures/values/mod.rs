//! Per-key value containers.
//!
//! Each node owns one container matching the list's `ValueMode`:
//!
//! ```text
//!   Unique           -> UniqueSlot      (one boxed value, swapped on replace)
//!   DuplicateList    -> ValueChain      (insertion-ordered linked cells)
//!   DuplicateOrdered -> OrderedValues   (value skip list, equal values side by side)
//! ```
//!
//! Mutations run under the owning node's lock. Reads run lock-free under a
//! pinned read guard and clone what they return; memory unlinked by a
//! mutation is handed to the list's guard.

mod chain;
mod ordered;
mod unique;

pub(crate) use chain::ValueChain;
pub(crate) use ordered::OrderedValues;
pub(crate) use unique::UniqueSlot;

use crate::comparator::Comparator;
use crate::config::ValueMode;
use crate::error::Result;
use crate::guard::Guard;

/// Operations every value container supports.
///
/// # Safety
///
/// Mutating methods (`store`, `take_first`, `take_matching`) require the
/// caller to hold the owning node's lock. Every method requires a pinned
/// read guard for as long as the call runs.
pub(crate) trait ValueContainer<V> {
    /// Store `value`. Returns `Ok(true)` when the container gained a value
    /// and `Ok(false)` when an existing value was replaced (unique mode only;
    /// duplicate containers always grow).
    unsafe fn store<G: Guard>(
        &self,
        value: V,
        if_not_present: bool,
        order: Option<&dyn Comparator<V>>,
        guard: &G,
    ) -> Result<bool>;

    unsafe fn take_first<G: Guard>(&self, guard: &G) -> Option<V>;

    unsafe fn take_matching<G: Guard>(
        &self,
        matches: &mut dyn FnMut(&V) -> bool,
        guard: &G,
    ) -> Vec<V>;

    unsafe fn first(&self) -> Option<V>;

    /// Visit values in container order. Returns `false` if `visit` stopped
    /// the walk.
    unsafe fn for_each(&self, visit: &mut dyn FnMut(&V) -> bool) -> bool;
}

pub(crate) enum NodeValues<V> {
    Unique(UniqueSlot<V>),
    List(ValueChain<V>),
    Ordered(OrderedValues<V>),
}

impl<V: Clone> NodeValues<V> {
    pub(crate) fn with_first(mode: ValueMode, value: V) -> Self {
        match mode {
            ValueMode::Unique => NodeValues::Unique(UniqueSlot::with_value(value)),
            ValueMode::DuplicateList => NodeValues::List(ValueChain::with_value(value)),
            ValueMode::DuplicateOrdered => NodeValues::Ordered(OrderedValues::with_value(value)),
        }
    }
}

impl<V> NodeValues<V> {
    /// Container for the head sentinel, which never holds a value.
    pub(crate) fn vacant() -> Self {
        NodeValues::Unique(UniqueSlot::empty())
    }

    pub(crate) fn mode(&self) -> ValueMode {
        match self {
            NodeValues::Unique(_) => ValueMode::Unique,
            NodeValues::List(_) => ValueMode::DuplicateList,
            NodeValues::Ordered(_) => ValueMode::DuplicateOrdered,
        }
    }
}

impl<V: Clone> ValueContainer<V> for NodeValues<V> {
    unsafe fn store<G: Guard>(
        &self,
        value: V,
        if_not_present: bool,
        order: Option<&dyn Comparator<V>>,
        guard: &G,
    ) -> Result<bool> {
        unsafe {
            match self {
                NodeValues::Unique(slot) => slot.store(value, if_not_present, order, guard),
                NodeValues::List(chain) => chain.store(value, if_not_present, order, guard),
                NodeValues::Ordered(set) => set.store(value, if_not_present, order, guard),
            }
        }
    }

    unsafe fn take_first<G: Guard>(&self, guard: &G) -> Option<V> {
        unsafe {
            match self {
                NodeValues::Unique(slot) => slot.take_first(guard),
                NodeValues::List(chain) => chain.take_first(guard),
                NodeValues::Ordered(set) => set.take_first(guard),
            }
        }
    }

    unsafe fn take_matching<G: Guard>(
        &self,
        matches: &mut dyn FnMut(&V) -> bool,
        guard: &G,
    ) -> Vec<V> {
        unsafe {
            match self {
                NodeValues::Unique(slot) => slot.take_matching(matches, guard),
                NodeValues::List(chain) => chain.take_matching(matches, guard),
                NodeValues::Ordered(set) => set.take_matching(matches, guard),
            }
        }
    }

    unsafe fn first(&self) -> Option<V> {
        unsafe {
            match self {
                NodeValues::Unique(slot) => slot.first(),
                NodeValues::List(chain) => chain.first(),
                NodeValues::Ordered(set) => set.first(),
            }
        }
    }

    unsafe fn for_each(&self, visit: &mut dyn FnMut(&V) -> bool) -> bool {
        unsafe {
            match self {
                NodeValues::Unique(slot) => slot.for_each(visit),
                NodeValues::List(chain) => chain.for_each(visit),
                NodeValues::Ordered(set) => set.for_each(visit),
            }
        }
    }
}
