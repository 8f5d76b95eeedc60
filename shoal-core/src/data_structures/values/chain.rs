//! Insertion-ordered value chain used in `ValueMode::DuplicateList`.
//!
//! ```text
//!   head ──► [v0] ──next──► [v1] ──next──► [v2] ──► null
//!                                           ▲
//!   tail ───────────────────────────────────┘
//! ```
//!
//! Writers (holding the node lock) append at `tail` and unlink cells in
//! place. Readers walk `head -> next` without locks; an unlinked cell keeps
//! its `next` pointer until the guard destroys it, so a reader standing on
//! it still reaches the rest of the chain.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use super::ValueContainer;
use crate::comparator::Comparator;
use crate::error::Result;
use crate::guard::{Guard, drop_boxed};

pub(crate) struct ValueCell<V> {
    value: V,
    next: AtomicPtr<ValueCell<V>>,
}

impl<V> ValueCell<V> {
    fn alloc(value: V) -> *mut Self {
        Box::into_raw(Box::new(ValueCell {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

pub(crate) struct ValueChain<V> {
    head: AtomicPtr<ValueCell<V>>,
    // Only touched under the node lock
    tail: AtomicPtr<ValueCell<V>>,
}

impl<V> ValueChain<V> {
    pub(crate) fn with_value(value: V) -> Self {
        let cell = ValueCell::alloc(value);
        ValueChain {
            head: AtomicPtr::new(cell),
            tail: AtomicPtr::new(cell),
        }
    }

    fn append(&self, cell: *mut ValueCell<V>) {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail.is_null() {
            self.head.store(cell, Ordering::Release);
        } else {
            unsafe { (*tail).next.store(cell, Ordering::Release) };
        }
        self.tail.store(cell, Ordering::Relaxed);
    }
}

impl<V: Clone> ValueContainer<V> for ValueChain<V> {
    unsafe fn store<G: Guard>(
        &self,
        value: V,
        _if_not_present: bool,
        _order: Option<&dyn Comparator<V>>,
        _guard: &G,
    ) -> Result<bool> {
        self.append(ValueCell::alloc(value));
        Ok(true)
    }

    unsafe fn take_first<G: Guard>(&self, guard: &G) -> Option<V> {
        let first = self.head.load(Ordering::Acquire);
        if first.is_null() {
            return None;
        }

        unsafe {
            let next = (*first).next.load(Ordering::Acquire);
            self.head.store(next, Ordering::Release);
            if next.is_null() {
                self.tail.store(ptr::null_mut(), Ordering::Relaxed);
            }

            let value = (*first).value.clone();
            guard.defer_destroy(first, drop_boxed::<ValueCell<V>>);
            Some(value)
        }
    }

    unsafe fn take_matching<G: Guard>(
        &self,
        matches: &mut dyn FnMut(&V) -> bool,
        guard: &G,
    ) -> Vec<V> {
        let mut taken = Vec::new();
        let mut prev: *mut ValueCell<V> = ptr::null_mut();
        let mut curr = self.head.load(Ordering::Acquire);

        while !curr.is_null() {
            unsafe {
                let next = (*curr).next.load(Ordering::Acquire);

                if !matches(&(*curr).value) {
                    prev = curr;
                    curr = next;
                    continue;
                }

                if prev.is_null() {
                    self.head.store(next, Ordering::Release);
                } else {
                    (*prev).next.store(next, Ordering::Release);
                }
                if self.tail.load(Ordering::Relaxed) == curr {
                    self.tail.store(prev, Ordering::Relaxed);
                }

                taken.push((*curr).value.clone());
                guard.defer_destroy(curr, drop_boxed::<ValueCell<V>>);
                curr = next;
            }
        }

        taken
    }

    unsafe fn first(&self) -> Option<V> {
        let first = self.head.load(Ordering::Acquire);
        unsafe { first.as_ref().map(|cell| cell.value.clone()) }
    }

    unsafe fn for_each(&self, visit: &mut dyn FnMut(&V) -> bool) -> bool {
        let mut curr = self.head.load(Ordering::Acquire);
        while let Some(cell) = unsafe { curr.as_ref() } {
            if !visit(&cell.value) {
                return false;
            }
            curr = cell.next.load(Ordering::Acquire);
        }
        true
    }
}

impl<V> Drop for ValueChain<V> {
    fn drop(&mut self) {
        let mut curr = *self.head.get_mut();
        while !curr.is_null() {
            let cell = unsafe { Box::from_raw(curr) };
            curr = cell.next.load(Ordering::Relaxed);
        }
    }
}
