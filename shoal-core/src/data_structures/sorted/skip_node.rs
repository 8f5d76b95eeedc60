use std::alloc::Layout;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use super::node_store::{HeapStore, NodeStore};
use crate::comparator::Comparator;
use crate::config::{LockBackend, ValueMode};
use crate::data_structures::internal::node_flags::NodeFlags;
use crate::data_structures::values::{NodeValues, ValueContainer};
use crate::error::Result;
use crate::guard::Guard;
use crate::preemptive_synchronization::NodeLock;

// ============================================================================
// SkipNode - key, value container and tower of forward pointers
// ============================================================================

/// A skip list node with tower structure.
///
/// Uses the flexible array member pattern: the `level` forward pointers are
/// allocated inline after the struct fields, so one allocation (heap or
/// arena) holds the whole node.
///
/// ```text
///   [ key | level | flags | count | lock | values ][ next[0] .. next[level-1] ]
/// ```
///
/// The head sentinel has no key and an always-empty unique container.
///
#[repr(C)]
pub(crate) struct SkipNode<K, V> {
    key: Option<K>,
    level: usize,
    flags: NodeFlags,
    // Values currently held; readers use it to skip drained nodes
    count: AtomicUsize,
    lock: NodeLock,
    values: NodeValues<V>,
    tower: [AtomicPtr<SkipNode<K, V>>; 0],
}

impl<K, V> SkipNode<K, V> {
    /// Layout for a node with `level` forward pointers.
    fn get_layout(level: usize) -> Layout {
        Layout::new::<Self>()
            .extend(Layout::array::<AtomicPtr<Self>>(level).unwrap())
            .unwrap()
            .0
            .pad_to_align()
    }

    /// Write every field of a freshly allocated node.
    unsafe fn init(
        ptr: *mut Self,
        key: Option<K>,
        level: usize,
        flags: NodeFlags,
        count: usize,
        lock: NodeLock,
        values: NodeValues<V>,
    ) {
        unsafe {
            ptr::write(
                ptr,
                SkipNode {
                    key,
                    level,
                    flags,
                    count: AtomicUsize::new(count),
                    lock,
                    values,
                    tower: [],
                },
            );

            let tower = (*ptr).tower.as_ptr() as *mut AtomicPtr<Self>;
            for i in 0..level {
                ptr::write(tower.add(i), AtomicPtr::new(ptr::null_mut()));
            }
        }
    }

    /// Allocate the head sentinel on the heap with `level` forward pointers.
    pub(crate) fn alloc_head(level: usize, backend: LockBackend) -> Result<*mut Self> {
        let ptr = HeapStore.allocate(Self::get_layout(level))?.cast::<Self>().as_ptr();
        unsafe {
            Self::init(
                ptr,
                None,
                level,
                NodeFlags::head(),
                0,
                NodeLock::new(backend),
                NodeValues::vacant(),
            );
        }
        Ok(ptr)
    }

    /// Deallocate a node after dropping its fields in place.
    ///
    /// # Safety
    /// `ptr` must have been allocated through store `S` and be unreachable.
    pub(crate) unsafe fn destroy<S: NodeStore>(ptr: *mut Self) {
        unsafe {
            let layout = Self::get_layout((*ptr).level);
            ptr::drop_in_place(ptr);
            S::deallocate(ptr as *mut u8, layout);
        }
    }

    // =========================================================================
    // Field access
    // =========================================================================

    /// The node's key. Never called on the head sentinel.
    #[inline]
    pub(crate) fn key(&self) -> &K {
        match &self.key {
            Some(key) => key,
            None => panic!("head sentinel has no key"),
        }
    }

    #[inline]
    pub(crate) fn level(&self) -> usize {
        self.level
    }

    #[inline]
    pub(crate) fn flags(&self) -> &NodeFlags {
        &self.flags
    }

    #[inline]
    pub(crate) fn lock(&self) -> &NodeLock {
        &self.lock
    }

    #[inline]
    pub(crate) fn value_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Live for readers and still holding at least one value.
    #[inline]
    pub(crate) fn is_visible(&self) -> bool {
        self.flags.is_live() && self.value_count() > 0
    }

    // =========================================================================
    // Tower access
    // =========================================================================

    #[inline]
    fn pointer_at(&self, level: usize) -> &AtomicPtr<SkipNode<K, V>> {
        debug_assert!(level < self.level, "level {} above node level {}", level, self.level);
        unsafe { &*self.tower.as_ptr().add(level) }
    }

    #[inline]
    pub(crate) fn next(&self, level: usize) -> *mut SkipNode<K, V> {
        self.pointer_at(level).load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_next(&self, level: usize, next: *mut SkipNode<K, V>) {
        self.pointer_at(level).store(next, Ordering::Release)
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// The container, checked against the mode tag in the flag word.
    ///
    /// A mismatch means the node was built for another list or its memory is
    /// corrupted; neither is recoverable.
    #[inline]
    fn values(&self) -> &NodeValues<V> {
        let flagged = self.flags.value_mode();
        let held = self.values.mode();
        if flagged != held {
            panic!(
                "value container mismatch: node flagged {:?} but holds {:?}",
                flagged, held
            );
        }
        &self.values
    }
}

impl<K, V: Clone> SkipNode<K, V> {
    /// Allocate a data node through `store` holding `value` as its only value.
    pub(crate) fn alloc_in<S: NodeStore>(
        store: &S,
        key: K,
        value: V,
        level: usize,
        mode: ValueMode,
        backend: LockBackend,
    ) -> Result<*mut Self> {
        let ptr = store.allocate(Self::get_layout(level))?.cast::<Self>().as_ptr();
        unsafe {
            Self::init(
                ptr,
                Some(key),
                level,
                NodeFlags::new(mode),
                1,
                NodeLock::new(backend),
                NodeValues::with_first(mode, value),
            );
        }
        Ok(ptr)
    }

    /// Store or merge a value. Returns `true` when the value count grew.
    ///
    /// # Safety
    /// Caller holds the node lock and a pinned read guard.
    pub(crate) unsafe fn store_value<G: Guard>(
        &self,
        value: V,
        if_not_present: bool,
        order: Option<&dyn Comparator<V>>,
        guard: &G,
    ) -> Result<bool> {
        let grew = unsafe { self.values().store(value, if_not_present, order, guard)? };
        if grew {
            self.count.fetch_add(1, Ordering::AcqRel);
        }
        Ok(grew)
    }

    /// # Safety
    /// Caller holds the node lock and a pinned read guard.
    pub(crate) unsafe fn take_first<G: Guard>(&self, guard: &G) -> Option<V> {
        let taken = unsafe { self.values().take_first(guard) };
        if taken.is_some() {
            self.count.fetch_sub(1, Ordering::AcqRel);
        }
        taken
    }

    /// # Safety
    /// Caller holds the node lock and a pinned read guard.
    pub(crate) unsafe fn take_matching<G: Guard>(
        &self,
        matches: &mut dyn FnMut(&V) -> bool,
        guard: &G,
    ) -> Vec<V> {
        let taken = unsafe { self.values().take_matching(matches, guard) };
        if !taken.is_empty() {
            self.count.fetch_sub(taken.len(), Ordering::AcqRel);
        }
        taken
    }

    /// # Safety
    /// Caller holds a pinned read guard.
    pub(crate) unsafe fn first_value(&self) -> Option<V> {
        unsafe { self.values().first() }
    }

    /// # Safety
    /// Caller holds a pinned read guard.
    pub(crate) unsafe fn for_each_value(&self, visit: &mut dyn FnMut(&V) -> bool) -> bool {
        unsafe { self.values().for_each(visit) }
    }
}
