//! Writer-Preferring Reader-Writer Lock
//!
//! [`SharedMutex`] guards no data of its own; it arbitrates between shared
//! (reader) and exclusive (writer) holders of some external resource.
//!
//! ## Design
//!
//! The lock keeps an explicit state record behind one `parking_lot::Mutex`:
//!
//! - `readers`: number of active shared holders
//! - `writer`: whether an exclusive holder is active
//! - `writers_waiting`: number of threads blocked in [`SharedMutex::lock`]
//!
//! Readers and writers block on separate condition variables. A writer that
//! cannot enter immediately registers itself in `writers_waiting`, which closes
//! the gate to every reader that arrives afterwards. Active readers drain, the
//! last one wakes a writer, and the writer proceeds. When the writer releases,
//! all parked readers and one parked writer are woken; if more writers are
//! still queued the readers go back to sleep.
//!
//! This bounds how long a writer waits under a continuous stream of readers,
//! at the cost of readers waiting behind queued writers.
//!
//! ## Contract
//!
//! Like every low-level mutex, the lock is not re-entrant: acquiring it twice
//! from one thread deadlocks. Releasing a lock that is not held is prevented by
//! the `unsafe` signatures of [`SharedMutex::unlock`] and
//! [`SharedMutex::unlock_shared`]; prefer the scoped guards in
//! [`crate::sync`], which make both impossible.

use core::fmt;
use parking_lot::{Condvar, Mutex};

/// Lock bookkeeping, only ever touched with `SharedMutex::state` held
#[derive(Debug, Default)]
struct State {
    readers: usize,
    writer: bool,
    writers_waiting: usize,
}

impl State {
    #[inline]
    fn exclusive_available(&self) -> bool {
        !self.writer && self.readers == 0
    }

    #[inline]
    fn shared_available(&self) -> bool {
        !self.writer && self.writers_waiting == 0
    }
}

/// A writer-preferring reader-writer lock
///
/// # Examples
///
/// ```rust
/// use rwtree::sync::SharedMutex;
///
/// let lock = SharedMutex::new();
///
/// lock.lock_shared();
/// assert!(lock.try_lock_shared());
/// assert!(!lock.try_lock());
/// unsafe {
///     lock.unlock_shared();
///     lock.unlock_shared();
/// }
///
/// assert!(lock.try_lock());
/// assert!(!lock.try_lock_shared());
/// unsafe { lock.unlock() };
/// ```
pub struct SharedMutex {
    state: Mutex<State>,
    // Readers park here while a writer holds or waits
    readers_gate: Condvar,
    // Writers park here while anyone holds
    writers_gate: Condvar,
}

impl SharedMutex {
    /// Create an unlocked `SharedMutex`
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State {
                readers: 0,
                writer: false,
                writers_waiting: 0,
            }),
            readers_gate: Condvar::new(),
            writers_gate: Condvar::new(),
        }
    }

    /// Acquire the lock in exclusive mode, blocking the current thread
    ///
    /// Returns once no shared or exclusive holder remains. From the moment this
    /// thread starts waiting, newly arriving readers are held back.
    pub fn lock(&self) {
        let mut state = self.state.lock();
        if state.exclusive_available() {
            state.writer = true;
            return;
        }

        tracing::trace!(
            readers = state.readers,
            writer = state.writer,
            "exclusive acquisition blocking"
        );

        state.writers_waiting += 1;
        while !state.exclusive_available() {
            self.writers_gate.wait(&mut state);
        }
        state.writers_waiting -= 1;
        state.writer = true;
    }

    /// Attempt to acquire the lock in exclusive mode without blocking
    ///
    /// Returns `true` if exclusive ownership was acquired.
    pub fn try_lock(&self) -> bool {
        let mut state = self.state.lock();
        if state.exclusive_available() {
            state.writer = true;
            true
        } else {
            false
        }
    }

    /// Release exclusive ownership
    ///
    /// Wakes every parked reader and one parked writer. Readers re-check the
    /// gate, so they only proceed when no further writer is queued.
    ///
    /// # Safety
    ///
    /// The lock must be held in exclusive mode by the current context, obtained
    /// through [`lock`](Self::lock) or a successful [`try_lock`](Self::try_lock).
    pub unsafe fn unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.writer, "unlock of a SharedMutex not held exclusively");
        state.writer = false;
        let wake_writer = state.writers_waiting > 0;
        drop(state);

        self.readers_gate.notify_all();
        if wake_writer {
            self.writers_gate.notify_one();
        }
    }

    /// Acquire the lock in shared mode, blocking the current thread
    ///
    /// Blocks while a writer holds the lock or is waiting for it.
    pub fn lock_shared(&self) {
        let mut state = self.state.lock();
        if !state.shared_available() {
            tracing::trace!(
                readers = state.readers,
                writer = state.writer,
                writers_waiting = state.writers_waiting,
                "shared acquisition blocking"
            );
            while !state.shared_available() {
                self.readers_gate.wait(&mut state);
            }
        }
        state.readers += 1;
    }

    /// Attempt to acquire the lock in shared mode without blocking
    ///
    /// Fails if a writer holds the lock or is waiting for it.
    pub fn try_lock_shared(&self) -> bool {
        let mut state = self.state.lock();
        if state.shared_available() {
            state.readers += 1;
            true
        } else {
            false
        }
    }

    /// Release one shared hold
    ///
    /// The last departing reader wakes a parked writer, if any.
    ///
    /// # Safety
    ///
    /// The current context must hold a shared lock obtained through
    /// [`lock_shared`](Self::lock_shared) or a successful
    /// [`try_lock_shared`](Self::try_lock_shared).
    pub unsafe fn unlock_shared(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.readers > 0, "unlock_shared of a SharedMutex with no readers");
        state.readers -= 1;
        let wake_writer = state.readers == 0 && state.writers_waiting > 0;
        drop(state);

        if wake_writer {
            self.writers_gate.notify_one();
        }
    }

    /// Whether any holder, shared or exclusive, is active
    ///
    /// The answer may be stale by the time the caller looks at it.
    pub fn is_locked(&self) -> bool {
        let state = self.state.lock();
        state.writer || state.readers > 0
    }

    /// Whether an exclusive holder is active
    pub fn is_locked_exclusive(&self) -> bool {
        self.state.lock().writer
    }

    /// Number of active shared holders
    pub fn reader_count(&self) -> usize {
        self.state.lock().readers
    }

    /// Number of threads blocked waiting for exclusive ownership
    pub fn pending_writers(&self) -> usize {
        self.state.lock().writers_waiting
    }
}

impl Default for SharedMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SharedMutex")
            .field("readers", &state.readers)
            .field("writer", &state.writer)
            .field("writers_waiting", &state.writers_waiting)
            .finish()
    }
}
