//! Where skip-list nodes live.
//!
//! `SkipList` never calls the global allocator for data nodes directly; it
//! asks its `NodeStore`. Two stores exist:
//!
//! ```text
//!   HeapStore   one allocation per node, unlinked nodes go to the guard
//!   ArenaStore  nodes bumped out of an Arena, unlinked nodes are parked in
//!               the store and dropped together with the arena
//! ```
//!
//! The head sentinel is always heap-allocated.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::{Mutex, PoisonError};

use super::arena::Arena;
use crate::config::SkipListConfig;
use crate::error::Result;
use crate::guard::Guard;

pub trait NodeStore: Sized + Send + Sync {
    fn from_config(config: &SkipListConfig) -> Result<Self>;

    /// Reserve uninitialized memory for one node.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>>;

    /// Release memory obtained from `allocate`.
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on a store of this type with the same
    /// `layout`, and the node stored there must already be dropped.
    unsafe fn deallocate(ptr: *mut u8, layout: Layout);

    /// Hand an unlinked node over for destruction once no reader can reach it.
    ///
    /// # Safety
    /// `node` must be unlinked from every level, allocated by this store and
    /// retired at most once. `destroy` must drop the node in place and call
    /// `deallocate`.
    unsafe fn retire<G: Guard, N>(&self, guard: &G, node: *mut N, destroy: unsafe fn(*mut N));
}

// =============================================================================
// HeapStore
// =============================================================================

#[derive(Debug, Default)]
pub struct HeapStore;

impl NodeStore for HeapStore {
    fn from_config(_config: &SkipListConfig) -> Result<Self> {
        Ok(HeapStore)
    }

    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        let ptr = unsafe { alloc::alloc(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => Ok(ptr),
            None => alloc::handle_alloc_error(layout),
        }
    }

    unsafe fn deallocate(ptr: *mut u8, layout: Layout) {
        unsafe { alloc::dealloc(ptr, layout) };
    }

    unsafe fn retire<G: Guard, N>(&self, guard: &G, node: *mut N, destroy: unsafe fn(*mut N)) {
        unsafe { guard.defer_destroy(node, destroy) };
    }
}

// =============================================================================
// ArenaStore
// =============================================================================

struct RetiredNode {
    offset: u64,
    destroy: unsafe fn(*mut ()),
}

/// Node store backed by a bump `Arena`.
///
/// Arena memory is only released as a whole, so retired nodes are kept (by
/// arena offset) until the store drops. Readers that still hold a retired
/// node therefore never see its memory freed while the list is alive.
pub struct ArenaStore {
    arena: Arena,
    retired: Mutex<Vec<RetiredNode>>,
}

impl ArenaStore {
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Nodes unlinked and waiting for the store to drop.
    pub fn retired_count(&self) -> usize {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// Safety: RetiredNode only carries an arena offset and a destruction function
unsafe impl Send for RetiredNode {}

impl NodeStore for ArenaStore {
    fn from_config(config: &SkipListConfig) -> Result<Self> {
        Ok(ArenaStore {
            arena: Arena::new(config.arena())?,
            retired: Mutex::new(Vec::new()),
        })
    }

    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        Ok(self.arena.alloc_raw(layout)?)
    }

    unsafe fn deallocate(_ptr: *mut u8, _layout: Layout) {
        // Arena memory is released when the arena drops
    }

    unsafe fn retire<G: Guard, N>(&self, _guard: &G, node: *mut N, destroy: unsafe fn(*mut N)) {
        let Some(offset) = self.arena.offset_of(node as *const u8) else {
            panic!("retired node {:p} does not belong to this arena", node);
        };

        let entry = RetiredNode {
            offset,
            destroy: unsafe {
                std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(destroy)
            },
        };
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

impl Drop for ArenaStore {
    fn drop(&mut self) {
        let retired = self.retired.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in retired.drain(..) {
            match self.arena.resolve(entry.offset) {
                Some(node) => unsafe { (entry.destroy)(node.as_ptr().cast()) },
                None => unreachable!("retired offset {:#x} outside the arena", entry.offset),
            }
        }
    }
}

impl std::fmt::Debug for ArenaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaStore")
            .field("arena", &self.arena)
            .field("retired", &self.retired_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::ValueMode;
    use crate::data_structures::sorted::arena::{ArenaError, ArenaSize};
    use crate::error::SkipListError;
    use crate::guard::DeferredGuard;

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    unsafe fn destroy_counted<S: NodeStore>(ptr: *mut Counted) {
        unsafe {
            std::ptr::drop_in_place(ptr);
            S::deallocate(ptr.cast(), Layout::new::<Counted>());
        }
    }

    fn place<S: NodeStore>(store: &S, dropped: &Arc<AtomicUsize>) -> *mut Counted {
        let ptr = store.allocate(Layout::new::<Counted>()).unwrap().cast::<Counted>();
        unsafe { ptr.as_ptr().write(Counted(Arc::clone(dropped))) };
        ptr.as_ptr()
    }

    #[test]
    fn test_heap_store_retires_through_guard() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let guard = DeferredGuard::default();
        let store = HeapStore::from_config(&SkipListConfig::default()).unwrap();

        let node = place(&store, &dropped);
        unsafe { store.retire(&guard, node, destroy_counted::<HeapStore>) };
        assert_eq!(guard.pending(), 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 0);

        drop(guard);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_arena_store_parks_retired_nodes() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let guard = DeferredGuard::default();
        let config = SkipListConfig::new(ValueMode::Unique).with_arena(ArenaSize::Small);
        let store = ArenaStore::from_config(&config).unwrap();

        for _ in 0..3 {
            let node = place(&store, &dropped);
            unsafe { store.retire(&guard, node, destroy_counted::<ArenaStore>) };
        }
        assert_eq!(guard.pending(), 0);
        assert_eq!(store.retired_count(), 3);
        assert!(store.arena().memory_used() >= 3 * std::mem::size_of::<Counted>());

        drop(store);
        assert_eq!(dropped.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_arena_store_surfaces_exhaustion() {
        let config = SkipListConfig::default().with_arena(ArenaSize::Custom {
            initial: 64,
            max_chunk: 64,
            cap: 64,
        });
        let store = ArenaStore::from_config(&config).unwrap();
        let block = Layout::from_size_align(64, 8).unwrap();

        assert!(store.allocate(block).is_ok());
        assert_eq!(
            store.allocate(block),
            Err(SkipListError::Arena(ArenaError::Full))
        );
        assert_eq!(
            store.allocate(Layout::from_size_align(128, 8).unwrap()),
            Err(SkipListError::Arena(ArenaError::Overflow))
        );
    }
}
