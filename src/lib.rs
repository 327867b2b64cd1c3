//! # rwtree
//!
//! A concurrent, key-ordered map built on a fair reader-writer lock.
//!
//! ## Features
//!
//! - **SharedMutex**: A writer-preferring reader-writer lock that holds no data
//! - **Scoped guards**: Shared and exclusive guards with immediate, try, deferred
//!   and adopt construction policies
//! - **ConcurrentOrderedMap**: An ordered map whose reads run in parallel under the
//!   shared lock and whose writes run under the exclusive lock, with closure-driven
//!   inspect-and-mutate primitives that execute atomically
//!
//! ## Quick Start
//!
//! ```rust
//! use rwtree::map::ConcurrentOrderedMap;
//!
//! let map = ConcurrentOrderedMap::new();
//! map.emplace(1, "one", false);
//! map.emplace(5, "five", false);
//!
//! assert_eq!(map.find(&1), Some("one"));
//! assert_eq!(map.find_infimum(&4), Some("one"));
//! assert_eq!(map.lower_bound(&4), Some("five"));
//! ```
//!
//! ## Thread Safety
//!
//! Every map operation takes the lock in the mode matching its access pattern and
//! releases it on every exit path, including a panic unwinding out of a caller
//! closure. Closures run while the lock is held and must never call back into the
//! same map: recursive acquisition deadlocks.
//!
//! ## Fairness
//!
//! A writer waiting on the lock closes the gate to newly arriving readers, so a
//! steady stream of readers cannot starve writers.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod map;
pub mod metrics;
pub mod sync;

pub use crate::map::{ConcurrentOrderedMap, KeyOrder, Natural, Replaced};
pub use crate::sync::{ExclusiveLock, SharedLock, SharedMutex};

/// Common utilities and helper types
pub mod util {
    use core::ops::Deref;

    /// Cache line size for alignment purposes
    pub const CACHE_LINE_SIZE: usize = 64;

    /// Pad a value to cache line size
    ///
    /// Keeps a hot value (such as a lock word) from sharing a cache line with
    /// the data it guards.
    #[repr(align(64))]
    pub struct CachePadded<T> {
        value: T,
    }

    impl<T> CachePadded<T> {
        /// Create a new cache-padded value
        #[inline]
        pub const fn new(value: T) -> Self {
            Self { value }
        }

        /// Get the inner value
        #[inline]
        pub fn into_inner(self) -> T {
            self.value
        }
    }

    impl<T> Deref for CachePadded<T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            &self.value
        }
    }

    impl<T: Default> Default for CachePadded<T> {
        fn default() -> Self {
            Self::new(T::default())
        }
    }

    impl<T: core::fmt::Debug> core::fmt::Debug for CachePadded<T> {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(&self.value, f)
        }
    }
}

/// Error types for rwtree operations
///
/// Absent keys and policy rejections are ordinary return values (`Option`,
/// `bool`, [`Replaced`]); this type covers non-blocking attempts that would
/// have had to wait and guard misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The lock could not be acquired without blocking
    #[error("Operation would block")]
    WouldBlock,
    /// The guard does not hold its lock
    #[error("Lock is not held by this guard")]
    LockNotHeld,
    /// The guard already holds its lock
    #[error("Lock is already held by this guard")]
    LockAlreadyHeld,
}

/// Result type for rwtree operations
pub type Result<T> = core::result::Result<T, Error>;
