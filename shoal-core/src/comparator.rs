use std::cmp::Ordering;

/// Total order over keys or values.
///
/// Implemented by [`NaturalOrder`] for `Ord` types and by any
/// `Fn(&T, &T) -> Ordering` closure.
pub trait Comparator<T>: Send + Sync {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders by the type's own `Ord` implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<T: Ord> Comparator<T> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering + Send + Sync,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}
