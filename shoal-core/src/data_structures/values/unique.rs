use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use super::ValueContainer;
use crate::comparator::Comparator;
use crate::error::{Result, SkipListError};
use crate::guard::{Guard, drop_boxed};

/// Single value slot used in `ValueMode::Unique`.
///
/// The value lives in its own allocation so a replace can publish the new
/// value with one swap while readers keep cloning the old one.
pub(crate) struct UniqueSlot<V> {
    slot: AtomicPtr<V>,
}

impl<V> UniqueSlot<V> {
    pub(crate) fn empty() -> Self {
        UniqueSlot {
            slot: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn with_value(value: V) -> Self {
        UniqueSlot {
            slot: AtomicPtr::new(Box::into_raw(Box::new(value))),
        }
    }
}

impl<V: Clone> ValueContainer<V> for UniqueSlot<V> {
    unsafe fn store<G: Guard>(
        &self,
        value: V,
        if_not_present: bool,
        _order: Option<&dyn Comparator<V>>,
        guard: &G,
    ) -> Result<bool> {
        if if_not_present && !self.slot.load(Ordering::Acquire).is_null() {
            return Err(SkipListError::ReplaceDisabled);
        }

        let new = Box::into_raw(Box::new(value));
        let old = self.slot.swap(new, Ordering::AcqRel);
        if old.is_null() {
            return Ok(true);
        }

        unsafe { guard.defer_destroy(old, drop_boxed::<V>) };
        Ok(false)
    }

    unsafe fn take_first<G: Guard>(&self, guard: &G) -> Option<V> {
        let old = self.slot.swap(ptr::null_mut(), Ordering::AcqRel);
        if old.is_null() {
            return None;
        }

        // Readers may still be cloning from `old`
        let value = unsafe { (*old).clone() };
        unsafe { guard.defer_destroy(old, drop_boxed::<V>) };
        Some(value)
    }

    unsafe fn take_matching<G: Guard>(
        &self,
        _matches: &mut dyn FnMut(&V) -> bool,
        _guard: &G,
    ) -> Vec<V> {
        panic!("value mode mismatch: a unique slot cannot take matching values");
    }

    unsafe fn first(&self) -> Option<V> {
        let current = self.slot.load(Ordering::Acquire);
        unsafe { current.as_ref().cloned() }
    }

    unsafe fn for_each(&self, visit: &mut dyn FnMut(&V) -> bool) -> bool {
        let current = self.slot.load(Ordering::Acquire);
        match unsafe { current.as_ref() } {
            Some(value) => visit(value),
            None => true,
        }
    }
}

impl<V> Drop for UniqueSlot<V> {
    fn drop(&mut self) {
        let current = *self.slot.get_mut();
        if !current.is_null() {
            unsafe { drop(Box::from_raw(current)) };
        }
    }
}
