//! Map implementations
//!
//! This module provides a concurrent, key-ordered map guarded by one
//! [`SharedMutex`](crate::sync::SharedMutex).
//!
//! ## Available Maps
//!
//! - [`ConcurrentOrderedMap`]: Parallel reads, serialized writes, ordered queries
//!
//! ## Choosing an Operation
//!
//! - Use `find`, `lower_bound` and `find_infimum` for point and ordered lookups
//! - Use `perform` / `perform_ro` to inspect or update one entry atomically
//! - Use `erase_if` to make a removal depend on the current value
//! - Use `for_each` / `for_each_ro` / `delete_if` for whole-map scans that no
//!   writer may interleave with
//! - Use the `try_*` variants where blocking on the lock is not acceptable

pub mod order;
pub mod ordered;
mod tree;

pub use self::order::{KeyOrder, Natural};
pub use self::ordered::{ConcurrentOrderedMap, Replaced};


#[cfg(test)]
mod proptests;
