//! Scoped acquisition of a [`SharedMutex`]
//!
//! A [`ScopedLock`] binds one lock and one mode. It remembers whether it
//! currently owns the lock and releases it on drop only if it does. Ownership
//! moves with the guard value and is never duplicated: guards are neither
//! `Clone` nor `Copy`.

use super::SharedMutex;
use crate::{Error, Result};
use core::fmt;
use core::marker::PhantomData;

mod sealed {
    pub trait Sealed {}
}

/// Acquisition mode of a [`ScopedLock`]
///
/// Implemented by [`Shared`] and [`Exclusive`]; sealed.
pub trait LockMode: sealed::Sealed {
    /// Mode name used in diagnostics
    const NAME: &'static str;

    /// Acquire `mutex` in this mode, blocking
    #[doc(hidden)]
    fn acquire(mutex: &SharedMutex);

    /// Acquire `mutex` in this mode if that needs no waiting
    #[doc(hidden)]
    fn try_acquire(mutex: &SharedMutex) -> bool;

    /// Release `mutex` from this mode
    ///
    /// # Safety
    ///
    /// The lock must be held in this mode.
    #[doc(hidden)]
    unsafe fn release(mutex: &SharedMutex);
}

/// Shared (reader) mode marker
#[derive(Debug, Clone, Copy)]
pub enum Shared {}

/// Exclusive (writer) mode marker
#[derive(Debug, Clone, Copy)]
pub enum Exclusive {}

impl sealed::Sealed for Shared {}
impl sealed::Sealed for Exclusive {}

impl LockMode for Shared {
    const NAME: &'static str = "shared";

    #[inline]
    fn acquire(mutex: &SharedMutex) {
        mutex.lock_shared();
    }

    #[inline]
    fn try_acquire(mutex: &SharedMutex) -> bool {
        mutex.try_lock_shared()
    }

    #[inline]
    unsafe fn release(mutex: &SharedMutex) {
        mutex.unlock_shared();
    }
}

impl LockMode for Exclusive {
    const NAME: &'static str = "exclusive";

    #[inline]
    fn acquire(mutex: &SharedMutex) {
        mutex.lock();
    }

    #[inline]
    fn try_acquire(mutex: &SharedMutex) -> bool {
        mutex.try_lock()
    }

    #[inline]
    unsafe fn release(mutex: &SharedMutex) {
        mutex.unlock();
    }
}

/// A scoped hold on a [`SharedMutex`] in mode `M`
///
/// Use the [`SharedLock`] and [`ExclusiveLock`] aliases.
///
/// # Examples
///
/// ```rust
/// use rwtree::sync::{ExclusiveLock, SharedLock, SharedMutex};
///
/// let lock = SharedMutex::new();
/// {
///     let reader = SharedLock::new(&lock);
///     assert!(reader.owns_lock());
///
///     let writer = ExclusiveLock::try_new(&lock);
///     assert!(!writer.owns_lock());
/// }
///
/// let mut writer = ExclusiveLock::deferred(&lock);
/// writer.lock()?;
/// assert!(lock.is_locked_exclusive());
/// writer.unlock()?;
/// assert!(!lock.is_locked());
/// # Ok::<(), rwtree::Error>(())
/// ```
#[must_use = "if unused the lock is released immediately"]
pub struct ScopedLock<'a, M: LockMode> {
    mutex: Option<&'a SharedMutex>,
    owns: bool,
    _mode: PhantomData<M>,
}

/// A scoped shared hold on a [`SharedMutex`]
pub type SharedLock<'a> = ScopedLock<'a, Shared>;

/// A scoped exclusive hold on a [`SharedMutex`]
pub type ExclusiveLock<'a> = ScopedLock<'a, Exclusive>;

impl<'a, M: LockMode> ScopedLock<'a, M> {
    /// Acquire `mutex`, blocking until it is available
    pub fn new(mutex: &'a SharedMutex) -> Self {
        M::acquire(mutex);
        Self::with_ownership(mutex, true)
    }

    /// Attempt to acquire `mutex` without blocking
    ///
    /// Check [`owns_lock`](Self::owns_lock) to learn whether it succeeded.
    pub fn try_new(mutex: &'a SharedMutex) -> Self {
        let owns = M::try_acquire(mutex);
        Self::with_ownership(mutex, owns)
    }

    /// Bind to `mutex` without acquiring it
    pub fn deferred(mutex: &'a SharedMutex) -> Self {
        Self::with_ownership(mutex, false)
    }

    /// Take over a hold the caller already has
    ///
    /// # Safety
    ///
    /// `mutex` must be held in mode `M` by the current context, and that hold
    /// must not be released by anyone but the returned guard.
    pub unsafe fn adopt(mutex: &'a SharedMutex) -> Self {
        Self::with_ownership(mutex, true)
    }

    fn with_ownership(mutex: &'a SharedMutex, owns: bool) -> Self {
        Self {
            mutex: Some(mutex),
            owns,
            _mode: PhantomData,
        }
    }

    /// Acquire the bound lock, blocking until it is available
    ///
    /// Fails with [`Error::LockAlreadyHeld`] if this guard already owns it, or
    /// [`Error::LockNotHeld`] if the guard was released from its lock.
    pub fn lock(&mut self) -> Result<()> {
        let mutex = self.unowned_mutex()?;
        M::acquire(mutex);
        self.owns = true;
        Ok(())
    }

    /// Attempt to acquire the bound lock without blocking
    ///
    /// Fails with [`Error::WouldBlock`] if the lock is unavailable, and with the
    /// same errors as [`lock`](Self::lock) on misuse.
    pub fn try_lock(&mut self) -> Result<()> {
        let mutex = self.unowned_mutex()?;
        if !M::try_acquire(mutex) {
            return Err(Error::WouldBlock);
        }
        self.owns = true;
        Ok(())
    }

    /// Release the bound lock early
    ///
    /// Fails with [`Error::LockNotHeld`] if this guard does not own it.
    pub fn unlock(&mut self) -> Result<()> {
        match self.mutex {
            Some(mutex) if self.owns => {
                self.owns = false;
                // SAFETY: `owns` records that this guard holds `mutex` in mode `M`
                unsafe { M::release(mutex) };
                Ok(())
            }
            _ => Err(Error::LockNotHeld),
        }
    }

    /// Whether this guard currently holds its lock
    #[inline]
    pub fn owns_lock(&self) -> bool {
        self.owns
    }

    /// The lock this guard is bound to, if any
    #[inline]
    pub fn mutex(&self) -> Option<&'a SharedMutex> {
        self.mutex
    }

    /// Disassociate from the lock without releasing it
    ///
    /// Returns the lock if the guard owned it; the caller then becomes
    /// responsible for releasing it.
    pub fn release(mut self) -> Option<&'a SharedMutex> {
        let owned = self.owns;
        self.owns = false;
        self.mutex.take().filter(|_| owned)
    }

    fn unowned_mutex(&self) -> Result<&'a SharedMutex> {
        match self.mutex {
            None => Err(Error::LockNotHeld),
            Some(_) if self.owns => Err(Error::LockAlreadyHeld),
            Some(mutex) => Ok(mutex),
        }
    }
}

impl<M: LockMode> Drop for ScopedLock<'_, M> {
    fn drop(&mut self) {
        if let (true, Some(mutex)) = (self.owns, self.mutex) {
            // SAFETY: `owns` records that this guard holds `mutex` in mode `M`
            unsafe { M::release(mutex) };
        }
    }
}

impl<M: LockMode> fmt::Debug for ScopedLock<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedLock")
            .field("mode", &M::NAME)
            .field("bound", &self.mutex.is_some())
            .field("owns", &self.owns)
            .finish()
    }
}
