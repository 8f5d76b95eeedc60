//! Value-ordered container used in `ValueMode::DuplicateOrdered`.
//!
//! A small single-writer skip list of value cells:
//!
//! ```text
//!   head[2] ───────────────────────► [4] ─────────────────► null
//!   head[1] ─────────► [2] ────────► [4] ─────────► [7] ──► null
//!   head[0] ──► [1] ─► [2] ─► [2] ─► [4] ─► [5] ──► [7] ──► null
//! ```
//!
//! Writers hold the node lock and relink cells in place; upper levels only
//! speed up the writer's search. Readers walk level 0 without locks. A cell
//! unlinked by a writer keeps its tower until the guard destroys it, so a
//! reader standing on it still reaches the rest of the values.
//!
//! Values comparing equal are kept side by side in insertion order.

use std::cmp::Ordering as CmpOrdering;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use super::ValueContainer;
use crate::comparator::Comparator;
use crate::data_structures::internal::level::random_level;
use crate::error::Result;
use crate::guard::{Guard, drop_boxed};

/// Tower height cap for value cells.
const CELL_LEVELS: usize = 16;

struct OrderedCell<V> {
    value: V,
    tower: Box<[AtomicPtr<OrderedCell<V>>]>,
}

impl<V> OrderedCell<V> {
    fn alloc(value: V, height: usize) -> *mut Self {
        let tower = (0..height).map(|_| AtomicPtr::new(ptr::null_mut())).collect();
        Box::into_raw(Box::new(OrderedCell { value, tower }))
    }
}

pub(crate) struct OrderedValues<V> {
    head: [AtomicPtr<OrderedCell<V>>; CELL_LEVELS],
    // Only drives the height of new cells
    len: AtomicUsize,
}

impl<V> OrderedValues<V> {
    pub(crate) fn with_value(value: V) -> Self {
        let values = OrderedValues {
            head: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            len: AtomicUsize::new(1),
        };
        values.head[0].store(OrderedCell::alloc(value, 1), Ordering::Release);
        values
    }

    /// For every level, the link a cell placed after all values `<= value`
    /// must be spliced into.
    fn insertion_links(
        &self,
        value: &V,
        order: &dyn Comparator<V>,
    ) -> [&AtomicPtr<OrderedCell<V>>; CELL_LEVELS] {
        let mut links: [&AtomicPtr<OrderedCell<V>>; CELL_LEVELS] =
            std::array::from_fn(|level| &self.head[level]);
        let mut tower: &[AtomicPtr<OrderedCell<V>>] = &self.head;

        for level in (0..CELL_LEVELS).rev() {
            while let Some(cell) = unsafe { tower[level].load(Ordering::Acquire).as_ref() } {
                if order.compare(&cell.value, value) == CmpOrdering::Greater {
                    break;
                }
                tower = &cell.tower;
            }
            links[level] = &tower[level];
        }

        links
    }
}

impl<V: Clone> ValueContainer<V> for OrderedValues<V> {
    unsafe fn store<G: Guard>(
        &self,
        value: V,
        _if_not_present: bool,
        order: Option<&dyn Comparator<V>>,
        _guard: &G,
    ) -> Result<bool> {
        let Some(order) = order else {
            panic!("ordered values stored without a value comparator");
        };

        let links = self.insertion_links(&value, order);
        let len = self.len.fetch_add(1, Ordering::Relaxed);
        let height = random_level(CELL_LEVELS, len as u64 + 1);

        let cell = OrderedCell::alloc(value, height);
        unsafe {
            for (level, link) in (*cell).tower.iter().enumerate() {
                link.store(links[level].load(Ordering::Acquire), Ordering::Relaxed);
            }
        }
        // Level 0 first: readers only ever need the bottom list
        for link in &links[..height] {
            link.store(cell, Ordering::Release);
        }
        Ok(true)
    }

    unsafe fn take_first<G: Guard>(&self, guard: &G) -> Option<V> {
        let first = self.head[0].load(Ordering::Acquire);
        let cell = unsafe { first.as_ref() }?;

        // The smallest cell is the first one on every level it reaches
        for (level, next) in cell.tower.iter().enumerate().rev() {
            self.head[level].store(next.load(Ordering::Acquire), Ordering::Release);
        }
        self.len.fetch_sub(1, Ordering::Relaxed);

        let value = cell.value.clone();
        unsafe { guard.defer_destroy(first, drop_boxed::<OrderedCell<V>>) };
        Some(value)
    }

    unsafe fn take_matching<G: Guard>(
        &self,
        matches: &mut dyn FnMut(&V) -> bool,
        guard: &G,
    ) -> Vec<V> {
        let mut taken = Vec::new();
        // Per level, the link of the last kept cell tall enough to reach it
        let mut links: [&AtomicPtr<OrderedCell<V>>; CELL_LEVELS] =
            std::array::from_fn(|level| &self.head[level]);
        let mut curr = self.head[0].load(Ordering::Acquire);

        while let Some(cell) = unsafe { curr.as_ref() } {
            if matches(&cell.value) {
                for (level, next) in cell.tower.iter().enumerate() {
                    links[level].store(next.load(Ordering::Acquire), Ordering::Release);
                }
                taken.push(cell.value.clone());
                unsafe { guard.defer_destroy(curr, drop_boxed::<OrderedCell<V>>) };
            } else {
                for (level, next) in cell.tower.iter().enumerate() {
                    links[level] = next;
                }
            }
            curr = cell.tower[0].load(Ordering::Acquire);
        }

        self.len.fetch_sub(taken.len(), Ordering::Relaxed);
        taken
    }

    unsafe fn first(&self) -> Option<V> {
        let first = self.head[0].load(Ordering::Acquire);
        unsafe { first.as_ref() }.map(|cell| cell.value.clone())
    }

    unsafe fn for_each(&self, visit: &mut dyn FnMut(&V) -> bool) -> bool {
        let mut curr = self.head[0].load(Ordering::Acquire);
        while let Some(cell) = unsafe { curr.as_ref() } {
            if !visit(&cell.value) {
                return false;
            }
            curr = cell.tower[0].load(Ordering::Acquire);
        }
        true
    }
}

impl<V> Drop for OrderedValues<V> {
    fn drop(&mut self) {
        let mut curr = *self.head[0].get_mut();
        while !curr.is_null() {
            let cell = unsafe { Box::from_raw(curr) };
            curr = cell.tower[0].load(Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::NaturalOrder;
    use crate::guard::DeferredGuard;

    #[derive(Debug, Clone, PartialEq)]
    struct Tagged {
        rank: u32,
        tag: &'static str,
    }

    fn by_rank(a: &Tagged, b: &Tagged) -> CmpOrdering {
        a.rank.cmp(&b.rank)
    }

    fn collect<V: Clone>(values: &OrderedValues<V>) -> Vec<V> {
        let mut out = Vec::new();
        unsafe {
            values.for_each(&mut |v| {
                out.push(v.clone());
                true
            });
        }
        out
    }

    /// Every upper level must be a sorted sub-sequence of level 0.
    fn assert_towers_consistent(values: &OrderedValues<u32>) {
        let bottom = collect(values);
        for level in 1..CELL_LEVELS {
            let mut seen = Vec::new();
            let mut curr = values.head[level].load(Ordering::Acquire);
            while let Some(cell) = unsafe { curr.as_ref() } {
                assert!(cell.tower.len() > level);
                seen.push(cell.value);
                curr = cell.tower[level].load(Ordering::Acquire);
            }
            assert!(seen.windows(2).all(|w| w[0] <= w[1]), "level {} unsorted", level);
            let mut rest = bottom.iter();
            assert!(seen.iter().all(|v| rest.any(|b| b == v)), "level {} not a subset", level);
        }
    }

    #[test]
    fn test_equal_values_kept_in_insertion_order() {
        let guard = DeferredGuard::default();
        let order: &dyn Comparator<Tagged> = &by_rank;
        let values = OrderedValues::with_value(Tagged { rank: 2, tag: "a" });

        unsafe {
            for (rank, tag) in [(1, "b"), (2, "c"), (3, "d"), (2, "e")] {
                assert_eq!(values.store(Tagged { rank, tag }, true, Some(order), &guard), Ok(true));
            }
        }

        let tags: Vec<_> = collect(&values).into_iter().map(|t| t.tag).collect();
        assert_eq!(tags, vec!["b", "a", "c", "e", "d"]);
        assert_eq!(guard.pending(), 0);
    }

    #[test]
    fn test_take_first_and_matching() {
        let guard = DeferredGuard::default();
        let order: &dyn Comparator<u32> = &NaturalOrder;
        let values = OrderedValues::with_value(9);

        unsafe {
            for v in [5, 8, 7, 1, 2, 4, 6] {
                values.store(v, false, Some(order), &guard).unwrap();
            }
            assert_eq!(values.first(), Some(1));

            let evens = values.take_matching(&mut |v| v % 2 == 0, &guard);
            assert_eq!(evens, vec![2, 4, 6, 8]);
            assert_eq!(collect(&values), vec![1, 5, 7, 9]);

            assert_eq!(values.take_first(&guard), Some(1));
            assert_eq!(values.first(), Some(5));
            assert_eq!(values.take_matching(&mut |v| *v > 100, &guard), Vec::<u32>::new());
            assert_eq!(values.take_matching(&mut |_| true, &guard), vec![5, 7, 9]);
            assert_eq!(values.take_first(&guard), None);
        }
        // One retired cell per removed value
        assert_eq!(guard.pending(), 8);
    }

    #[test]
    fn test_towers_survive_interleaved_edits() {
        let guard = DeferredGuard::default();
        let order: &dyn Comparator<u32> = &NaturalOrder;
        let values = OrderedValues::with_value(0);

        unsafe {
            for v in (1..2000).rev() {
                values.store(v % 500, false, Some(order), &guard).unwrap();
            }
            assert_towers_consistent(&values);

            values.take_matching(&mut |v| v % 3 == 0, &guard);
            assert_towers_consistent(&values);

            for _ in 0..100 {
                values.take_first(&guard);
            }
            for v in 0..300 {
                values.store(v * 7 % 500, false, Some(order), &guard).unwrap();
            }
            assert_towers_consistent(&values);
        }

        let all = collect(&values);
        assert!(all.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_heavy_duplicates_retire_nothing_on_insert() {
        let guard = DeferredGuard::default();
        let order: &dyn Comparator<u32> = &NaturalOrder;
        let values = OrderedValues::with_value(0);

        unsafe {
            for v in 1..50_000u32 {
                values.store(v.wrapping_mul(2_654_435_761) % 10_000, false, Some(order), &guard)
                    .unwrap();
            }
        }
        assert_eq!(guard.pending(), 0);

        let all = collect(&values);
        assert_eq!(all.len(), 50_000);
        assert!(all.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    #[should_panic(expected = "without a value comparator")]
    fn test_store_without_comparator_panics() {
        let guard = DeferredGuard::default();
        let values = OrderedValues::with_value(1);
        unsafe {
            let _ = values.store(2, false, None, &guard);
        }
    }
}
