//! Named POSIX semaphores.
//!
//! [`NamedSemaphore`] wraps `sem_open`/`sem_wait`/`sem_post` for a semaphore
//! that lives in the system namespace and is shared between unrelated
//! processes. The handle that *created* a semaphore also owns its name: when
//! that handle is closed (or dropped) the name is unlinked as well.
//!
//! Interrupted waits (`EINTR`) are never reported as errors.
//! [`NamedSemaphore::wait_until`] retries them and polls a cancellation
//! check, so a caller parked on an empty semaphore can still observe a
//! shutdown request.

use std::ffi::{CStr, CString};
use std::io;
use std::time::Duration;

use crate::error::ShmError;

/// How long a cancellable wait blocks before re-checking its cancellation
/// predicate.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a cancellable wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The semaphore was decremented.
    Acquired,
    /// The cancellation check fired before the semaphore could be decremented.
    Cancelled,
}

impl Wait {
    #[inline]
    pub fn is_cancelled(self) -> bool {
        matches!(self, Wait::Cancelled)
    }
}

/// A handle to a named, kernel-visible counting semaphore.
pub struct NamedSemaphore {
    raw: *mut libc::sem_t,
    name: CString,
    /// Set for the handle that created the semaphore; it unlinks the name.
    owned: bool,
}

// SAFETY: POSIX semaphores are designed to be operated on concurrently from
// multiple threads and processes.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Create a new semaphore with the given initial value.
    ///
    /// Fails if the name already exists.
    pub fn create(name: &CStr, initial: u32) -> Result<Self, ShmError> {
        // SAFETY: `name` is a valid NUL-terminated string; the variadic
        // arguments are the mode and initial value required with O_CREAT.
        let raw = unsafe {
            libc::sem_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        if raw == libc::SEM_FAILED {
            return Err(ShmError::last_os_error("sem_open(create)", name));
        }
        tracing::debug!(name = ?name, initial, "created semaphore");
        Ok(Self {
            raw,
            name: name.to_owned(),
            owned: true,
        })
    }

    /// Open an existing semaphore.
    pub fn open(name: &CStr) -> Result<Self, ShmError> {
        // SAFETY: `name` is a valid NUL-terminated string.
        let raw = unsafe { libc::sem_open(name.as_ptr(), libc::O_RDWR) };
        if raw == libc::SEM_FAILED {
            return Err(ShmError::last_os_error("sem_open", name));
        }
        Ok(Self {
            raw,
            name: name.to_owned(),
            owned: false,
        })
    }

    /// Decrement without blocking. Returns `false` if the value was zero.
    pub fn try_wait(&self) -> Result<bool, ShmError> {
        loop {
            // SAFETY: `raw` is a live handle until `release` nulls it, and
            // `release` takes `&mut self`.
            if unsafe { libc::sem_trywait(self.raw) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(ShmError::io("sem_trywait", &self.name, err)),
            }
        }
    }

    /// Decrement, blocking while the value is zero, unless `cancelled`
    /// reports true first.
    ///
    /// A pending token always wins over cancellation. `cancelled` is
    /// evaluated before blocking, after every interrupted wait, and at least
    /// once per [`WAIT_POLL_INTERVAL`].
    pub fn wait_until(&self, cancelled: impl Fn() -> bool) -> Result<Wait, ShmError> {
        loop {
            if self.try_wait()? {
                return Ok(Wait::Acquired);
            }
            if cancelled() {
                return Ok(Wait::Cancelled);
            }
            let deadline = realtime_deadline(WAIT_POLL_INTERVAL);
            // SAFETY: see `try_wait`; `deadline` is a valid timespec.
            if unsafe { libc::sem_timedwait(self.raw, &deadline) } == 0 {
                return Ok(Wait::Acquired);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) | Some(libc::ETIMEDOUT) => continue,
                _ => return Err(ShmError::io("sem_timedwait", &self.name, err)),
            }
        }
    }

    /// Increment, waking one waiter if any.
    pub fn post(&self) -> Result<(), ShmError> {
        // SAFETY: see `try_wait`.
        if unsafe { libc::sem_post(self.raw) } == 0 {
            Ok(())
        } else {
            Err(ShmError::last_os_error("sem_post", &self.name))
        }
    }

    /// Current value. Only a snapshot: other processes may change it at any time.
    pub fn value(&self) -> Result<u32, ShmError> {
        let mut value: libc::c_int = 0;
        // SAFETY: see `try_wait`; `value` is a valid out-pointer.
        if unsafe { libc::sem_getvalue(self.raw, &mut value) } != 0 {
            return Err(ShmError::last_os_error("sem_getvalue", &self.name));
        }
        // Linux reports 0 (never negative) when there are waiters.
        Ok(value.max(0) as u32)
    }

    /// Close the handle, and unlink the name if this handle created it.
    pub fn close(mut self) -> Result<(), ShmError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), ShmError> {
        if self.raw.is_null() {
            return Ok(());
        }
        let raw = std::mem::replace(&mut self.raw, std::ptr::null_mut());
        // SAFETY: `raw` came from a successful `sem_open` and is closed once.
        let closed = if unsafe { libc::sem_close(raw) } == 0 {
            Ok(())
        } else {
            Err(ShmError::last_os_error("sem_close", &self.name))
        };
        let unlinked = if self.owned {
            self.owned = false;
            unlink(&self.name)
        } else {
            Ok(())
        };
        closed.and(unlinked)
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to release semaphore");
        }
    }
}

impl std::fmt::Debug for NamedSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedSemaphore")
            .field("name", &self.name)
            .field("owned", &self.owned)
            .finish_non_exhaustive()
    }
}

/// Remove a semaphore name from the system namespace.
pub fn unlink(name: &CStr) -> Result<(), ShmError> {
    // SAFETY: `name` is a valid NUL-terminated string.
    if unsafe { libc::sem_unlink(name.as_ptr()) } == 0 {
        tracing::debug!(name = ?name, "unlinked semaphore");
        Ok(())
    } else {
        Err(ShmError::last_os_error("sem_unlink", name))
    }
}

/// Absolute CLOCK_REALTIME deadline `after` from now, as `sem_timedwait` wants.
fn realtime_deadline(after: Duration) -> libc::timespec {
    // SAFETY: timespec is plain old data; all-zero is a valid value.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: `ts` is a valid out-pointer. CLOCK_REALTIME cannot fail here.
    unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    ts.tv_sec += after.as_secs() as libc::time_t;
    ts.tv_nsec += after.subsec_nanos() as libc::c_long;
    if ts.tv_nsec >= 1_000_000_000 {
        ts.tv_sec += 1;
        ts.tv_nsec -= 1_000_000_000;
    }
    ts
}
