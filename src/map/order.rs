//! Key ordering
//!
//! The map orders its keys with a comparator value fixed at construction.
//! [`Natural`] uses the key type's own [`Ord`]; any
//! `Fn(&K, &K) -> Ordering` closure or function can be used instead.

use core::cmp::Ordering;

/// A strict total order over `K`
///
/// Implementations must be consistent: `compare(a, b)` returns the reverse of
/// `compare(b, a)`, and the relation is transitive. An inconsistent order does
/// not cause undefined behavior, but lookups may then miss entries.
pub trait KeyOrder<K: ?Sized> {
    /// Compare two keys
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// The natural order of a key type, as given by its [`Ord`] implementation
///
/// # Examples
///
/// ```rust
/// use rwtree::map::{KeyOrder, Natural};
/// use std::cmp::Ordering;
///
/// assert_eq!(Natural.compare(&1, &2), Ordering::Less);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Natural;

impl<K: Ord + ?Sized> KeyOrder<K> for Natural {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

impl<K: ?Sized, F> KeyOrder<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}
