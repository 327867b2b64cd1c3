//! Locking primitives
//!
//! This module provides the reader-writer lock the ordered map is built on, and
//! scoped guards over it.
//!
//! ## Available Types
//!
//! - [`SharedMutex`]: Writer-preferring reader-writer lock without data
//! - [`SharedLock`]: Scoped shared (reader) hold
//! - [`ExclusiveLock`]: Scoped exclusive (writer) hold
//!
//! ## Guard Policies
//!
//! | Constructor | Acquires | Blocks | Releases on drop |
//! |-------------|----------|--------|------------------|
//! | `new` | yes | yes | yes |
//! | `try_new` | if free | no | if acquired |
//! | `deferred` | no | no | after a later `lock`/`try_lock` |
//! | `adopt` (unsafe) | already held | no | yes |
//!
//! ## Examples
//!
//! ```rust
//! use rwtree::sync::{SharedLock, SharedMutex};
//!
//! let lock = SharedMutex::new();
//!
//! lock.lock_shared();
//! // Hand the raw hold to a guard so it is released at end of scope
//! let guard = unsafe { SharedLock::adopt(&lock) };
//! assert!(guard.owns_lock());
//! assert_eq!(lock.reader_count(), 1);
//!
//! drop(guard);
//! assert!(!lock.is_locked());
//! ```

pub mod guard;
pub mod shared_mutex;

pub use self::guard::{Exclusive, ExclusiveLock, LockMode, ScopedLock, Shared, SharedLock};
pub use self::shared_mutex::SharedMutex;
