//! Concurrent Ordered Map Implementation
//!
//! This module implements a key-ordered map guarded by a single
//! [`SharedMutex`]. Read operations run under the shared lock, so any number of
//! them proceed in parallel; write operations run under the exclusive lock and
//! are serialized against everything else.
//!
//! ## Design
//!
//! The map uses:
//! - An AVL tree ordered by a comparator value supplied at construction
//! - One writer-preferring reader-writer lock for the whole tree
//! - Scoped guards, so the lock is released on every exit path, including a
//!   panic unwinding out of a caller closure
//! - Closure-driven primitives (`perform`, `erase_if`, `for_each`,
//!   `delete_if`, ...) that inspect and mutate entries inside one critical
//!   section
//!
//! ## Atomicity
//!
//! Every public operation is one critical section and is linearizable with
//! respect to every other. Nothing is atomic across two calls: combine a
//! lookup and an update with [`perform`](ConcurrentOrderedMap::perform) or
//! [`erase_if`](ConcurrentOrderedMap::erase_if) rather than with `find`
//! followed by `emplace`.
//!
//! ## Re-entrancy
//!
//! Closures run while the lock is held. A closure must not call back into the
//! same map: the lock is not re-entrant and the thread deadlocks.
//!
//! ## Performance Characteristics
//!
//! - **Point lookup, lower bound, infimum**: O(log n), shared lock
//! - **Insert, remove, perform**: O(log n), exclusive lock
//! - **for_each, for_each_ro, keys**: O(n), one lock hold for the whole scan
//! - **delete_if**: O(n + m log n) for m erased entries, exclusive lock
//!
//! ## Example
//!
//! ```rust
//! use rwtree::map::ConcurrentOrderedMap;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let map = Arc::new(ConcurrentOrderedMap::new());
//!
//! let writers: Vec<_> = (0..4)
//!     .map(|t| {
//!         let map = Arc::clone(&map);
//!         thread::spawn(move || {
//!             for i in 0..250 {
//!                 map.emplace(t * 250 + i, 0u64, false);
//!             }
//!         })
//!     })
//!     .collect();
//! for writer in writers {
//!     writer.join().unwrap();
//! }
//!
//! // Atomic read-modify-write of one entry
//! map.perform(&10, |_, hits| *hits += 1);
//! assert_eq!(map.find(&10), Some(1));
//! assert_eq!(map.len(), 1000);
//! ```

use super::order::{KeyOrder, Natural};
use super::tree::OrderedTree;
use crate::metrics::{AtomicMetrics, MetricsCollector, PerformanceMetrics};
use crate::sync::{Exclusive, LockMode, ScopedLock, Shared, SharedMutex};
use crate::util::CachePadded;
use crate::{Error, Result};
use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Outcome of [`ConcurrentOrderedMap::replace`]
///
/// Every variant carries the value stored under the key once the call
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Replaced<V> {
    /// The key was absent; the new value was inserted
    Inserted(V),
    /// The key was present and `force` was set; the new value replaced the old
    Overwritten(V),
    /// The key was present and `force` was not set; the existing value stays
    Kept(V),
}

impl<V> Replaced<V> {
    /// The value stored under the key
    pub fn value(&self) -> &V {
        match self {
            Replaced::Inserted(value) | Replaced::Overwritten(value) | Replaced::Kept(value) => {
                value
            }
        }
    }

    /// Consume the outcome, returning the stored value
    pub fn into_value(self) -> V {
        match self {
            Replaced::Inserted(value) | Replaced::Overwritten(value) | Replaced::Kept(value) => {
                value
            }
        }
    }

    /// Whether the call created a new entry
    pub fn was_inserted(&self) -> bool {
        matches!(self, Replaced::Inserted(_))
    }
}

/// A concurrent key-ordered map
///
/// # Type Parameters
///
/// * `K` - The key type
/// * `V` - The value type; lookups return clones, so most readers need `V: Clone`
/// * `C` - The key order, [`Natural`] (the key's `Ord`) by default
///
/// # Safety
///
/// The map is `Sync` under the same conditions as `std::sync::RwLock`: keys,
/// values and the order must be `Send + Sync`.
///
/// # Examples
///
/// ```rust
/// use rwtree::map::ConcurrentOrderedMap;
///
/// let map: ConcurrentOrderedMap<u32, String> = ConcurrentOrderedMap::new();
/// assert!(map.emplace(1, "hello".to_string(), false));
/// assert!(!map.emplace(1, "world".to_string(), false));
/// assert_eq!(map.find(&1), Some("hello".to_string()));
/// ```
pub struct ConcurrentOrderedMap<K, V, C = Natural> {
    lock: CachePadded<SharedMutex>,
    tree: UnsafeCell<OrderedTree<K, V, C>>,
    metrics: AtomicMetrics,
    metrics_enabled: AtomicBool,
}

// SAFETY: the tree is only reached through `read` (shared lock held) and
// `write` (exclusive lock held), the same discipline as `RwLock<T>`
unsafe impl<K, V, C> Sync for ConcurrentOrderedMap<K, V, C>
where
    K: Send + Sync,
    V: Send + Sync,
    C: Send + Sync,
{
}

impl<K: Ord, V> ConcurrentOrderedMap<K, V, Natural> {
    /// Create an empty map ordered by the key's `Ord`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map: ConcurrentOrderedMap<i32, String> = ConcurrentOrderedMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_order(Natural)
    }
}

impl<K, V, C> ConcurrentOrderedMap<K, V, C> {
    /// Create an empty map ordered by `order`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map = ConcurrentOrderedMap::with_order(|a: &i32, b: &i32| b.cmp(a));
    /// map.emplace(1, 'a', false);
    /// map.emplace(3, 'c', false);
    /// assert_eq!(map.keys(), vec![3, 1]);
    /// ```
    pub fn with_order(order: C) -> Self {
        Self {
            lock: CachePadded::new(SharedMutex::new()),
            tree: UnsafeCell::new(OrderedTree::new(order)),
            metrics: AtomicMetrics::default(),
            metrics_enabled: AtomicBool::new(true),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        let started = self.start();
        let len = self.read(|tree| tree.len());
        self.finish(started, true);
        len
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        let started = self.start();
        let empty = self.read(|tree| tree.is_empty());
        self.finish(started, true);
        empty
    }

    /// Remove every entry in one exclusive critical section
    pub fn clear(&self) {
        let started = self.start();
        let cleared = self.write(|tree| {
            let len = tree.len();
            tree.clear();
            len
        });
        tracing::debug!(cleared, "cleared ordered map");
        self.finish(started, true);
    }

    /// Visit every entry in ascending key order under one shared hold
    ///
    /// No writer runs while the scan is in progress, so `f` observes a stable
    /// snapshot. Returns how many calls of `f` returned `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map: ConcurrentOrderedMap<i32, i32> = (1..=4).map(|k| (k, k * k)).collect();
    /// let mut squares = Vec::new();
    /// let large = map.for_each_ro(|_, square| {
    ///     squares.push(*square);
    ///     *square > 4
    /// });
    /// assert_eq!(squares, vec![1, 4, 9, 16]);
    /// assert_eq!(large, 2);
    /// ```
    pub fn for_each_ro<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let started = self.start();
        let succeeded = self.read(|tree| tree.iter().filter(|&(key, value)| f(key, value)).count());
        self.finish(started, true);
        succeeded
    }

    /// Visit every entry mutably in ascending key order under one exclusive hold
    ///
    /// Returns how many calls of `f` returned `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map: ConcurrentOrderedMap<i32, i32> = (1..=3).map(|k| (k, 0)).collect();
    /// let touched = map.for_each(|key, value| {
    ///     *value = key * 100;
    ///     true
    /// });
    /// assert_eq!(touched, 3);
    /// assert_eq!(map.find(&2), Some(200));
    /// ```
    pub fn for_each<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let started = self.start();
        let succeeded = self.write(|tree| {
            let mut succeeded = 0;
            tree.for_each_mut(|key, value| {
                if f(key, value) {
                    succeeded += 1;
                }
            });
            succeeded
        });
        self.finish(started, true);
        succeeded
    }

    /// Run `f` with a shared borrow of the tree, holding the shared lock
    fn read<R>(&self, f: impl FnOnce(&OrderedTree<K, V, C>) -> R) -> R {
        let _guard = self.acquire::<Shared>();
        // SAFETY: the shared lock excludes every writer for the guard's lifetime
        f(unsafe { &*self.tree.get() })
    }

    /// Run `f` with an exclusive borrow of the tree, holding the exclusive lock
    fn write<R>(&self, f: impl FnOnce(&mut OrderedTree<K, V, C>) -> R) -> R {
        let _guard = self.acquire::<Exclusive>();
        // SAFETY: the exclusive lock excludes every other reader and writer
        f(unsafe { &mut *self.tree.get() })
    }

    fn try_read<R>(&self, f: impl FnOnce(&OrderedTree<K, V, C>) -> R) -> Result<R> {
        let guard = ScopedLock::<Shared>::try_new(&self.lock);
        if !guard.owns_lock() {
            self.note_contention();
            return Err(Error::WouldBlock);
        }
        // SAFETY: as in `read`; `guard` is alive until the end of this call
        Ok(f(unsafe { &*self.tree.get() }))
    }

    fn try_write<R>(&self, f: impl FnOnce(&mut OrderedTree<K, V, C>) -> R) -> Result<R> {
        let guard = ScopedLock::<Exclusive>::try_new(&self.lock);
        if !guard.owns_lock() {
            self.note_contention();
            return Err(Error::WouldBlock);
        }
        // SAFETY: as in `write`; `guard` is alive until the end of this call
        Ok(f(unsafe { &mut *self.tree.get() }))
    }

    /// Acquire the lock in mode `M`, counting the acquisition as contended
    /// when the non-blocking attempt fails
    fn acquire<M: LockMode>(&self) -> ScopedLock<'_, M> {
        let guard = ScopedLock::try_new(&self.lock);
        if guard.owns_lock() {
            return guard;
        }
        self.note_contention();
        ScopedLock::new(&self.lock)
    }

    #[inline]
    fn note_contention(&self) {
        if self.is_metrics_enabled() {
            self.metrics.record_contention();
        }
    }

    #[inline]
    fn start(&self) -> Option<Instant> {
        self.is_metrics_enabled().then(Instant::now)
    }

    #[inline]
    fn finish(&self, started: Option<Instant>, success: bool) {
        if let Some(started) = started {
            self.metrics.record(success, started.elapsed());
        }
    }
}

impl<K, V, C: KeyOrder<K>> ConcurrentOrderedMap<K, V, C> {
    /// Look up the value stored under `key`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map = ConcurrentOrderedMap::new();
    /// map.emplace("a", 1, false);
    /// assert_eq!(map.find(&"a"), Some(1));
    /// assert_eq!(map.find(&"b"), None);
    /// ```
    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let started = self.start();
        let found = self.read(|tree| tree.get(key).cloned());
        self.finish(started, found.is_some());
        found
    }

    /// Like [`find`](Self::find), but fails with [`Error::WouldBlock`] instead
    /// of waiting for the lock
    pub fn try_find(&self, key: &K) -> Result<Option<V>>
    where
        V: Clone,
    {
        let started = self.start();
        let found = self.try_read(|tree| tree.get(key).cloned());
        self.finish(started, matches!(found, Ok(Some(_))));
        found
    }

    /// Whether an entry exists for `key`
    pub fn contains_key(&self, key: &K) -> bool {
        let started = self.start();
        let found = self.read(|tree| tree.contains_key(key));
        self.finish(started, found);
        found
    }

    /// Value of the least key not less than `key`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map: ConcurrentOrderedMap<i32, &str> = [(10, "x"), (20, "y")].into_iter().collect();
    /// assert_eq!(map.lower_bound(&10), Some("x"));
    /// assert_eq!(map.lower_bound(&11), Some("y"));
    /// assert_eq!(map.lower_bound(&21), None);
    /// ```
    pub fn lower_bound(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let started = self.start();
        let found = self.read(|tree| tree.lower_bound(key).map(|(_, value)| value.clone()));
        self.finish(started, found.is_some());
        found
    }

    /// Entry with the least key not less than `key`
    pub fn lower_bound_key(&self, key: &K) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let started = self.start();
        let found = self.read(|tree| {
            tree.lower_bound(key)
                .map(|(key, value)| (key.clone(), value.clone()))
        });
        self.finish(started, found.is_some());
        found
    }

    /// Value of the greatest key not greater than `key`
    ///
    /// An exact match wins. Otherwise the entry just before the lower bound is
    /// returned; there is none when the map is empty or every key is greater
    /// than `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map: ConcurrentOrderedMap<i32, &str> =
    ///     [(1, "a"), (5, "b"), (10, "c")].into_iter().collect();
    /// assert_eq!(map.find_infimum(&7), Some("b"));
    /// assert_eq!(map.find_infimum(&5), Some("b"));
    /// assert_eq!(map.find_infimum(&0), None);
    /// ```
    pub fn find_infimum(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let started = self.start();
        let found = self.read(|tree| tree.infimum(key).map(|(_, value)| value.clone()));
        self.finish(started, found.is_some());
        found
    }

    /// Entry with the greatest key not greater than `key`
    pub fn find_infimum_key(&self, key: &K) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let started = self.start();
        let found = self.read(|tree| {
            tree.infimum(key)
                .map(|(key, value)| (key.clone(), value.clone()))
        });
        self.finish(started, found.is_some());
        found
    }

    /// Ordered snapshot of every key
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let started = self.start();
        let keys = self.read(|tree| tree.iter().map(|(key, _)| key.clone()).collect());
        self.finish(started, true);
        keys
    }

    /// Run `f` on the entry for `key` under the shared lock
    ///
    /// Returns `None` without calling `f` if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map = ConcurrentOrderedMap::new();
    /// map.emplace(1, vec![1, 2, 3], false);
    /// assert_eq!(map.perform_ro(&1, |_, list| list.len()), Some(3));
    /// assert_eq!(map.perform_ro(&2, |_, list| list.len()), None);
    /// ```
    pub fn perform_ro<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&K, &V) -> R,
    {
        let started = self.start();
        let result = self.read(|tree| tree.get_key_value(key).map(|(key, value)| f(key, value)));
        self.finish(started, result.is_some());
        result
    }

    /// Like [`perform_ro`](Self::perform_ro), but fails with
    /// [`Error::WouldBlock`] instead of waiting for the lock
    pub fn try_perform_ro<F, R>(&self, key: &K, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&K, &V) -> R,
    {
        let started = self.start();
        let result =
            self.try_read(|tree| tree.get_key_value(key).map(|(key, value)| f(key, value)));
        self.finish(started, matches!(result, Ok(Some(_))));
        result
    }

    /// Store `value` under `key`
    ///
    /// If the key is absent the entry is created. If it is present, `value`
    /// replaces the existing value only when `force` is set. Returns whether
    /// `value` was stored.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map = ConcurrentOrderedMap::new();
    /// assert!(map.emplace(7, "first", false));
    /// assert!(!map.emplace(7, "second", false));
    /// assert_eq!(map.find(&7), Some("first"));
    ///
    /// assert!(map.emplace(7, "third", true));
    /// assert_eq!(map.find(&7), Some("third"));
    /// ```
    pub fn emplace(&self, key: K, value: V, force: bool) -> bool {
        let started = self.start();
        let stored = self.write(|tree| Self::store(tree, key, value, force));
        self.finish(started, stored);
        stored
    }

    /// Like [`emplace`](Self::emplace), but fails with [`Error::WouldBlock`]
    /// instead of waiting for the lock
    pub fn try_emplace(&self, key: K, value: V, force: bool) -> Result<bool> {
        let started = self.start();
        let stored = self.try_write(|tree| Self::store(tree, key, value, force));
        self.finish(started, stored == Ok(true));
        stored
    }

    fn store(tree: &mut OrderedTree<K, V, C>, key: K, value: V, force: bool) -> bool {
        if !force && tree.contains_key(&key) {
            return false;
        }
        tree.insert(key, value);
        true
    }

    /// Build a value in place for an absent `key`
    ///
    /// `make` runs inside the critical section and only if the key is absent,
    /// so no value is built just to be thrown away. Returns whether an entry
    /// was created.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map = ConcurrentOrderedMap::new();
    /// assert!(map.create_with(1, || String::from("built")));
    /// assert!(!map.create_with(1, || unreachable!()));
    /// ```
    pub fn create_with<F>(&self, key: K, make: F) -> bool
    where
        F: FnOnce() -> V,
    {
        let started = self.start();
        let created = self.write(|tree| {
            if tree.contains_key(&key) {
                return false;
            }
            tree.insert(key, make());
            true
        });
        self.finish(started, created);
        created
    }

    /// Insert or conditionally overwrite, reporting what happened
    ///
    /// * key absent: `value` is inserted, [`Replaced::Inserted`]
    /// * key present and `force`: `value` overwrites, [`Replaced::Overwritten`]
    /// * key present, no `force`: nothing changes, [`Replaced::Kept`] with the
    ///   existing value
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::{ConcurrentOrderedMap, Replaced};
    ///
    /// let map = ConcurrentOrderedMap::new();
    /// assert_eq!(map.replace(1, 10, true), Replaced::Inserted(10));
    /// assert_eq!(map.replace(1, 20, false), Replaced::Kept(10));
    /// assert_eq!(map.replace(1, 30, true), Replaced::Overwritten(30));
    /// assert_eq!(map.find(&1), Some(30));
    /// ```
    pub fn replace(&self, key: K, value: V, force: bool) -> Replaced<V>
    where
        V: Clone,
    {
        let started = self.start();
        let outcome = self.write(|tree| {
            if let Some((_, current)) = tree.get_key_value_mut(&key) {
                if !force {
                    return Replaced::Kept(current.clone());
                }
                *current = value.clone();
                return Replaced::Overwritten(value);
            }
            tree.insert(key, value.clone());
            Replaced::Inserted(value)
        });
        self.finish(started, !matches!(outcome, Replaced::Kept(_)));
        outcome
    }

    /// Remove the entry for `key`, returning whether one existed
    pub fn erase(&self, key: &K) -> bool {
        let started = self.start();
        let erased = self.write(|tree| tree.remove(key).is_some());
        self.finish(started, erased);
        erased
    }

    /// Remove the entry for `key` if `f` approves
    ///
    /// `f` sees the current value and may adjust it before deciding; the
    /// decision and the removal happen in the same critical section. Returns
    /// whether the entry was removed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map = ConcurrentOrderedMap::new();
    /// map.emplace("session", 2u32, false);
    ///
    /// // Drop the session once its reference count reaches zero
    /// for remaining in [1, 0] {
    ///     let erased = map.erase_if(&"session", |_, refs| {
    ///         *refs -= 1;
    ///         *refs == 0
    ///     });
    ///     assert_eq!(erased, remaining == 0);
    /// }
    /// assert!(map.is_empty());
    /// ```
    pub fn erase_if<F>(&self, key: &K, f: F) -> bool
    where
        F: FnOnce(&K, &mut V) -> bool,
    {
        let started = self.start();
        let erased = self.write(|tree| {
            let Some((stored_key, value)) = tree.get_key_value_mut(key) else {
                return false;
            };
            if !f(stored_key, value) {
                return false;
            }
            tree.remove(key).is_some()
        });
        self.finish(started, erased);
        erased
    }

    /// Remove and return the value for `key`
    pub fn remove(&self, key: &K) -> Option<V> {
        let started = self.start();
        let removed = self.write(|tree| tree.remove(key).map(|(_, value)| value));
        self.finish(started, removed.is_some());
        removed
    }

    /// Like [`remove`](Self::remove), but fails with [`Error::WouldBlock`]
    /// instead of waiting for the lock
    pub fn try_remove(&self, key: &K) -> Result<Option<V>> {
        let started = self.start();
        let removed = self.try_write(|tree| tree.remove(key).map(|(_, value)| value));
        self.finish(started, matches!(removed, Ok(Some(_))));
        removed
    }

    /// Run `f` on the entry for `key` under the exclusive lock
    ///
    /// `f` may mutate the value in place. Returns `None` without calling `f`
    /// if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map = ConcurrentOrderedMap::new();
    /// map.emplace("balance", 100i64, false);
    ///
    /// // Withdraw only if the funds are there, in one critical section
    /// let withdrawn = map.perform(&"balance", |_, balance| {
    ///     if *balance < 70 {
    ///         return false;
    ///     }
    ///     *balance -= 70;
    ///     true
    /// });
    /// assert_eq!(withdrawn, Some(true));
    /// assert_eq!(map.find(&"balance"), Some(30));
    /// assert_eq!(map.perform(&"missing", |_, balance| *balance), None);
    /// ```
    pub fn perform<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&K, &mut V) -> R,
    {
        let started = self.start();
        let result =
            self.write(|tree| tree.get_key_value_mut(key).map(|(key, value)| f(key, value)));
        self.finish(started, result.is_some());
        result
    }

    /// Like [`perform`](Self::perform), but fails with [`Error::WouldBlock`]
    /// instead of waiting for the lock
    pub fn try_perform<F, R>(&self, key: &K, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&K, &mut V) -> R,
    {
        let started = self.start();
        let result =
            self.try_write(|tree| tree.get_key_value_mut(key).map(|(key, value)| f(key, value)));
        self.finish(started, matches!(result, Ok(Some(_))));
        result
    }

    /// Erase every entry for which `f` returns `true`
    ///
    /// One ascending scan under one exclusive hold; every entry is visited
    /// exactly once. Erasure is applied after the scan, so if `f` panics
    /// nothing is erased. Returns the number of entries erased.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rwtree::map::ConcurrentOrderedMap;
    ///
    /// let map: ConcurrentOrderedMap<i32, ()> = (1..=5).map(|k| (k, ())).collect();
    /// assert_eq!(map.delete_if(|key, _| key % 2 == 0), 2);
    /// assert_eq!(map.keys(), vec![1, 3, 5]);
    /// ```
    pub fn delete_if<F>(&self, mut f: F) -> usize
    where
        K: Clone,
        F: FnMut(&K, &mut V) -> bool,
    {
        let started = self.start();
        let erased = self.write(|tree| {
            let mut doomed = Vec::new();
            tree.for_each_mut(|key, value| {
                if f(key, value) {
                    doomed.push(key.clone());
                }
            });
            for key in &doomed {
                tree.remove(key);
            }
            doomed.len()
        });
        tracing::debug!(erased, "delete_if finished");
        self.finish(started, true);
        erased
    }
}

impl<K, V, C> MetricsCollector for ConcurrentOrderedMap<K, V, C> {
    fn metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics_enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics_enabled.load(Ordering::Relaxed)
    }
}

impl<K: Ord, V> Default for ConcurrentOrderedMap<K, V, Natural> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for ConcurrentOrderedMap<K, V, Natural> {
    /// Later duplicates overwrite earlier ones
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, C: KeyOrder<K>> Extend<(K, V)> for ConcurrentOrderedMap<K, V, C> {
    /// Insert every pair; later duplicates overwrite earlier ones
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let tree = self.tree.get_mut();
        for (key, value) in iter {
            tree.insert(key, value);
        }
    }
}

impl<K: Clone, V: Clone, C: Clone> Clone for ConcurrentOrderedMap<K, V, C> {
    /// Snapshot the entries under the shared lock; metrics start fresh
    fn clone(&self) -> Self {
        let tree = self.read(|tree| tree.clone());
        Self {
            lock: CachePadded::new(SharedMutex::new()),
            tree: UnsafeCell::new(tree),
            metrics: AtomicMetrics::default(),
            metrics_enabled: AtomicBool::new(self.is_metrics_enabled()),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for ConcurrentOrderedMap<K, V, C> {
    /// Formats the entries under the shared lock
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|tree| f.debug_map().entries(tree.iter()).finish())
    }
}
