// Bump arena backing `ArenaStore`.
//
// The arena is a list of chunks. Chunk i holds `initial << i` bytes, capped at
// `max_chunk`, and the sum of all chunks never exceeds `cap`:
//
//   chunk 0: [######.......]   initial
//   chunk 1: [##########################.....]   2 * initial
//   chunk 2: ...                                  up to max_chunk
//
// The allocation cursor packs the current chunk index and the bump offset
// into one atomic word so a CAS both claims bytes and pins the chunk they
// belong to:
//
//   63        48 47                                0
//   +-----------+-----------------------------------+
//   |  chunk    |            offset                 |
//   +-----------+-----------------------------------+
//
// Bumping is lock-free. Growing takes `grow_lock`, publishes the new chunk
// pointer and only then moves the cursor into it, so a thread that wins a CAS
// on a cursor always finds its chunk pointer set.
//
// The same packed value doubles as the stable address of an allocation:
// `offset_of` and `resolve` convert between pointers and arena offsets.
//
// Memory handed out is never reused. Chunks are freed when the arena drops.
//
use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Result, SkipListError};

const OFFSET_BITS: u32 = 48;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// Hard limit on the number of chunks an arena may grow to.
pub const MAX_CHUNKS: usize = 32;

/// Alignment of every chunk base. Requests with a larger alignment overflow.
pub const CHUNK_ALIGN: usize = 64;

const KIB: usize = 1 << 10;
const MIB: usize = 1 << 20;

const SMALL_INITIAL_CHUNK: usize = 64 * KIB;
const SMALL_MAX_CHUNK: usize = MIB;
const SMALL_CAP: usize = 64 * MIB;

const DEFAULT_INITIAL_CHUNK: usize = MIB;
const DEFAULT_MAX_CHUNK: usize = 16 * MIB;
const DEFAULT_CAP: usize = 512 * MIB;

const LARGE_INITIAL_CHUNK: usize = 8 * MIB;
const LARGE_MAX_CHUNK: usize = 64 * MIB;
const LARGE_CAP: usize = 2048 * MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("allocation does not fit in an arena chunk")]
    Overflow,

    #[error("arena reached its byte ceiling")]
    Full,
}

/// Named arena sizing presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArenaSize {
    Small,
    #[default]
    Default,
    Large,
    Custom {
        initial: usize,
        max_chunk: usize,
        cap: usize,
    },
}

impl ArenaSize {
    pub fn to_policy(self) -> ArenaPolicy {
        let (initial_chunk, max_chunk, cap) = match self {
            ArenaSize::Small => (SMALL_INITIAL_CHUNK, SMALL_MAX_CHUNK, SMALL_CAP),
            ArenaSize::Default => (DEFAULT_INITIAL_CHUNK, DEFAULT_MAX_CHUNK, DEFAULT_CAP),
            ArenaSize::Large => (LARGE_INITIAL_CHUNK, LARGE_MAX_CHUNK, LARGE_CAP),
            ArenaSize::Custom {
                initial,
                max_chunk,
                cap,
            } => (initial, max_chunk, cap),
        };

        ArenaPolicy {
            initial_chunk,
            max_chunk,
            cap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaPolicy {
    pub initial_chunk: usize,
    pub max_chunk: usize,
    pub cap: usize,
}

impl ArenaPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.initial_chunk == 0 {
            return Err(SkipListError::InvalidConfig(
                "arena initial chunk must be non-zero",
            ));
        }
        if self.max_chunk < self.initial_chunk {
            return Err(SkipListError::InvalidConfig(
                "arena max chunk must not be smaller than the initial chunk",
            ));
        }
        if self.cap < self.initial_chunk {
            return Err(SkipListError::InvalidConfig(
                "arena cap must hold at least the initial chunk",
            ));
        }
        if self.max_chunk as u64 > OFFSET_MASK {
            return Err(SkipListError::InvalidConfig(
                "arena max chunk exceeds the addressable offset range",
            ));
        }
        Ok(())
    }

    /// Size of chunk `index`: doubles per chunk, capped at `max_chunk`.
    pub fn chunk_size(&self, index: usize) -> usize {
        let mut size = self.initial_chunk;
        for _ in 0..index {
            if size >= self.max_chunk {
                break;
            }
            size = size.saturating_mul(2);
        }
        size.min(self.max_chunk)
    }
}

#[inline]
fn pack(chunk: usize, offset: usize) -> u64 {
    ((chunk as u64) << OFFSET_BITS) | offset as u64
}

#[inline]
fn unpack(cursor: u64) -> (usize, usize) {
    (
        (cursor >> OFFSET_BITS) as usize,
        (cursor & OFFSET_MASK) as usize,
    )
}

#[inline]
fn align_up(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (offset + (align - 1)) & !(align - 1)
}

pub struct Arena {
    cursor: AtomicU64,
    chunks: [AtomicPtr<u8>; MAX_CHUNKS],
    grow_lock: Mutex<()>,
    allocated_bytes: AtomicUsize,
    memory_used: AtomicUsize,
    policy: ArenaPolicy,
}

impl Arena {
    /// Create an arena and allocate its first chunk.
    pub fn new(size: ArenaSize) -> Result<Self> {
        let policy = size.to_policy();
        policy.validate()?;

        let first = Self::allocate_chunk(policy.initial_chunk);
        let chunks: [AtomicPtr<u8>; MAX_CHUNKS] =
            std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut()));
        chunks[0].store(first, Ordering::Relaxed);

        debug!(
            initial_chunk = policy.initial_chunk,
            max_chunk = policy.max_chunk,
            cap = policy.cap,
            "arena created"
        );

        Ok(Arena {
            cursor: AtomicU64::new(pack(0, 0)),
            chunks,
            grow_lock: Mutex::new(()),
            allocated_bytes: AtomicUsize::new(policy.initial_chunk),
            memory_used: AtomicUsize::new(0),
            policy,
        })
    }

    fn chunk_layout(size: usize) -> Layout {
        // size > 0 and CHUNK_ALIGN is a power of two, checked by validate()
        unsafe { Layout::from_size_align_unchecked(size, CHUNK_ALIGN) }
    }

    fn allocate_chunk(size: usize) -> *mut u8 {
        let layout = Self::chunk_layout(size);
        let chunk = unsafe { alloc::alloc(layout) };
        if chunk.is_null() {
            alloc::handle_alloc_error(layout);
        }
        chunk
    }

    /// Reserve `layout.size()` bytes aligned to `layout.align()`.
    ///
    /// The returned memory is uninitialized and stays valid until the arena
    /// drops.
    pub fn alloc_raw(&self, layout: Layout) -> Result<NonNull<u8>, ArenaError> {
        if layout.size() > self.policy.max_chunk || layout.align() > CHUNK_ALIGN {
            return Err(ArenaError::Overflow);
        }

        loop {
            let cursor = self.cursor.load(Ordering::Acquire);
            let (chunk, offset) = unpack(cursor);

            let aligned = align_up(offset, layout.align());
            let next = aligned + layout.size();
            if next > self.policy.chunk_size(chunk) {
                self.grow(cursor)?;
                continue;
            }

            if self
                .cursor
                .compare_exchange_weak(
                    cursor,
                    pack(chunk, next),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                let base = self.chunks[chunk].load(Ordering::Acquire);
                self.memory_used.fetch_add(layout.size(), Ordering::Relaxed);
                return Ok(unsafe { NonNull::new_unchecked(base.add(aligned)) });
            }

            std::hint::spin_loop();
        }
    }

    fn grow(&self, observed: u64) -> Result<(), ArenaError> {
        let _held = self.grow_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another thread grew the arena (or bumped) since we looked
        if self.cursor.load(Ordering::Acquire) != observed {
            return Ok(());
        }

        let (chunk, _) = unpack(observed);
        let next_chunk = chunk + 1;
        let size = self.policy.chunk_size(next_chunk);
        let allocated = self.allocated_bytes.load(Ordering::Relaxed);

        if next_chunk >= MAX_CHUNKS || allocated + size > self.policy.cap {
            warn!(
                chunks = chunk + 1,
                allocated,
                cap = self.policy.cap,
                "arena is full, refusing to grow"
            );
            return Err(ArenaError::Full);
        }

        let base = Self::allocate_chunk(size);
        self.chunks[next_chunk].store(base, Ordering::Release);
        self.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        self.cursor.store(pack(next_chunk, 0), Ordering::Release);

        debug!(
            chunk = next_chunk,
            size,
            allocated = allocated + size,
            "arena grew"
        );
        Ok(())
    }

    /// Arena offset of a pointer previously returned by `alloc_raw`.
    pub fn offset_of(&self, ptr: *const u8) -> Option<u64> {
        let addr = ptr as usize;
        for (index, chunk) in self.chunks.iter().enumerate() {
            let base = chunk.load(Ordering::Acquire);
            if base.is_null() {
                break;
            }

            let start = base as usize;
            if addr >= start && addr < start + self.policy.chunk_size(index) {
                return Some(pack(index, addr - start));
            }
        }
        None
    }

    /// Pointer for an offset produced by `offset_of`.
    pub fn resolve(&self, offset: u64) -> Option<NonNull<u8>> {
        let (chunk, within) = unpack(offset);
        if chunk >= MAX_CHUNKS || within >= self.policy.chunk_size(chunk) {
            return None;
        }

        let base = self.chunks[chunk].load(Ordering::Acquire);
        NonNull::new(base).map(|base| unsafe { base.add(within) })
    }

    /// Bytes handed out to callers, excluding alignment padding.
    #[inline]
    pub fn memory_used(&self) -> usize {
        self.memory_used.load(Ordering::Relaxed)
    }

    /// Bytes reserved from the global allocator across all chunks.
    #[inline]
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        unpack(self.cursor.load(Ordering::Acquire)).0 + 1
    }

    pub fn policy(&self) -> &ArenaPolicy {
        &self.policy
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for (index, chunk) in self.chunks.iter_mut().enumerate() {
            let base = *chunk.get_mut();
            if base.is_null() {
                break;
            }
            unsafe { alloc::dealloc(base, Self::chunk_layout(self.policy.chunk_size(index))) };
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("chunks", &self.chunk_count())
            .field("allocated_bytes", &self.allocated_bytes())
            .field("memory_used", &self.memory_used())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;

    fn tiny(initial: usize, max_chunk: usize, cap: usize) -> Arena {
        Arena::new(ArenaSize::Custom {
            initial,
            max_chunk,
            cap,
        })
        .unwrap()
    }

    #[test]
    fn test_competing_allocs_are_disjoint() {
        let arena = tiny(1024, 16 * 1024, 1 << 20);

        let addresses: Vec<Vec<usize>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        (0..1000)
                            .map(|_| {
                                let ptr = arena.alloc_raw(Layout::new::<u64>()).unwrap();
                                ptr.as_ptr() as usize
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut seen = HashSet::new();
        for address in addresses.into_iter().flatten() {
            assert_eq!(address % 8, 0);
            assert!(seen.insert(address), "address {:#x} handed out twice", address);
        }
        assert_eq!(arena.memory_used(), 8 * 1000 * 8);
        assert!(arena.chunk_count() > 1);
    }

    #[test]
    fn test_alignment_padding() {
        let arena = tiny(64, 64, 256);

        let byte = arena.alloc_raw(Layout::new::<u8>()).unwrap();
        let word = arena.alloc_raw(Layout::new::<u64>()).unwrap();
        assert_eq!(word.as_ptr() as usize - byte.as_ptr() as usize, 8);
        assert_eq!(arena.memory_used(), 9);
    }

    #[test]
    fn test_chunks_double_up_to_max_chunk() {
        let policy = ArenaSize::Custom {
            initial: 1024,
            max_chunk: 4096,
            cap: 1 << 20,
        }
        .to_policy();

        let sizes: Vec<_> = (0..5).map(|i| policy.chunk_size(i)).collect();
        assert_eq!(sizes, vec![1024, 2048, 4096, 4096, 4096]);
    }

    #[test]
    fn test_growth_then_full() {
        // Chunks of 128 + 256 fit in the cap, a third chunk does not
        let arena = tiny(128, 256, 512);
        let block = Layout::from_size_align(128, 8).unwrap();

        assert!(arena.alloc_raw(block).is_ok());
        assert_eq!(arena.chunk_count(), 1);

        assert!(arena.alloc_raw(block).is_ok());
        assert!(arena.alloc_raw(block).is_ok());
        assert_eq!(arena.chunk_count(), 2);
        assert_eq!(arena.allocated_bytes(), 384);

        assert_eq!(arena.alloc_raw(block), Err(ArenaError::Full));
    }

    #[test]
    fn test_oversize_request_overflows() {
        let arena = tiny(128, 256, 1024);
        assert_eq!(
            arena.alloc_raw(Layout::from_size_align(512, 8).unwrap()),
            Err(ArenaError::Overflow)
        );
        assert_eq!(
            arena.alloc_raw(Layout::from_size_align(8, 128).unwrap()),
            Err(ArenaError::Overflow)
        );
    }

    #[test]
    fn test_offsets_resolve_to_pointers() {
        let arena = tiny(64, 128, 1024);
        let layout = Layout::new::<[u64; 4]>();

        let pointers: Vec<_> = (0..6).map(|_| arena.alloc_raw(layout).unwrap()).collect();
        for pointer in pointers {
            let offset = arena.offset_of(pointer.as_ptr()).unwrap();
            assert_eq!(arena.resolve(offset), Some(pointer));
        }

        let outside = 0u8;
        assert_eq!(arena.offset_of(&outside), None);
        assert_eq!(arena.resolve(pack(MAX_CHUNKS - 1, 0)), None);
    }

    #[test]
    fn test_tower_node_fits() {
        #[repr(C)]
        struct Node {
            level: usize,
            tower: [AtomicPtr<Node>; 0],
        }

        let arena = tiny(256, 256, 1024);
        let layout = Layout::new::<Node>()
            .extend(Layout::array::<AtomicPtr<Node>>(4).unwrap())
            .unwrap()
            .0
            .pad_to_align();

        let raw = arena.alloc_raw(layout).unwrap().cast::<Node>();
        unsafe {
            raw.as_ptr().write(Node { level: 4, tower: [] });
            let tower = (*raw.as_ptr()).tower.as_ptr();
            for i in 0..4 {
                tower.add(i).cast_mut().write(AtomicPtr::new(ptr::null_mut()));
            }
            assert_eq!((*raw.as_ptr()).level, 4);
        }
        assert_eq!(arena.memory_used(), layout.size());
    }

    #[test]
    fn test_invalid_policies() {
        for size in [
            ArenaSize::Custom {
                initial: 0,
                max_chunk: 64,
                cap: 64,
            },
            ArenaSize::Custom {
                initial: 128,
                max_chunk: 64,
                cap: 1024,
            },
            ArenaSize::Custom {
                initial: 128,
                max_chunk: 128,
                cap: 64,
            },
        ] {
            assert!(matches!(
                Arena::new(size),
                Err(SkipListError::InvalidConfig(_))
            ));
        }

        for preset in [ArenaSize::Small, ArenaSize::Default, ArenaSize::Large] {
            assert!(preset.to_policy().validate().is_ok());
        }
    }
}
