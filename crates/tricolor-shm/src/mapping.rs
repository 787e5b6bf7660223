//! POSIX shared-memory segments mapped into this process.

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd};
use std::ptr::NonNull;

use crate::error::ShmError;

/// A `shm_open` segment mapped read/write and shared.
///
/// The file descriptor is closed as soon as the mapping exists; the mapping
/// alone keeps the segment alive. The mapping that created the segment owns
/// its name and unlinks it on release.
pub struct ShmMapping {
    base: Option<NonNull<u8>>,
    len: usize,
    name: CString,
    owned: bool,
}

// SAFETY: the mapping is plain memory; every shared field inside it is
// synchronized either through atomics or through the semaphore protocol.
unsafe impl Send for ShmMapping {}
unsafe impl Sync for ShmMapping {}

impl ShmMapping {
    /// Create a new zero-filled segment of `len` bytes.
    ///
    /// Fails if the name already exists.
    pub fn create(name: &CStr, len: usize) -> Result<Self, ShmError> {
        // SAFETY: `name` is a valid NUL-terminated string.
        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd == -1 {
            return Err(ShmError::last_os_error("shm_open(create)", name));
        }
        // SAFETY: `fd` is a freshly opened descriptor we exclusively own.
        let file = unsafe { File::from_raw_fd(fd) };

        let mapped = file
            .set_len(len as u64)
            .map_err(|e| ShmError::io("ftruncate", name, e))
            .and_then(|()| map(&file, len, name));
        match mapped {
            Ok(base) => {
                tracing::debug!(name = ?name, len, "created shared segment");
                Ok(Self {
                    base: Some(base),
                    len,
                    name: name.to_owned(),
                    owned: true,
                })
            }
            Err(e) => {
                // The name is ours; do not leave it behind.
                let _ = unlink(name);
                Err(e)
            }
        }
    }

    /// Open and map an existing segment. The whole segment is mapped; callers
    /// validate its size against what they expect.
    pub fn open(name: &CStr) -> Result<Self, ShmError> {
        // SAFETY: `name` is a valid NUL-terminated string.
        let fd = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDWR, 0) };
        if fd == -1 {
            return Err(ShmError::last_os_error("shm_open", name));
        }
        // SAFETY: `fd` is a freshly opened descriptor we exclusively own.
        let file = unsafe { File::from_raw_fd(fd) };
        let len = file
            .metadata()
            .map_err(|e| ShmError::io("fstat", name, e))?
            .len() as usize;
        if len == 0 {
            return Err(ShmError::io(
                "mmap",
                name,
                io::Error::new(io::ErrorKind::InvalidData, "segment has zero length"),
            ));
        }
        let base = map(&file, len, name)?;
        Ok(Self {
            base: Some(base),
            len,
            name: name.to_owned(),
            owned: false,
        })
    }

    /// Base address of the mapping.
    ///
    /// # Panics
    ///
    /// Panics if called after the mapping has been released, which the
    /// ownership rules of this type make unreachable.
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.expect("mapping used after release").as_ptr()
    }

    pub fn size(&self) -> usize {
        self.len
    }

    /// Unmap, and unlink the name if this mapping created it.
    pub fn close(mut self) -> Result<(), ShmError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), ShmError> {
        let Some(base) = self.base.take() else {
            return Ok(());
        };
        // SAFETY: base/len describe a live mapping created by `map`.
        let unmapped = if unsafe { libc::munmap(base.as_ptr().cast(), self.len) } == 0 {
            Ok(())
        } else {
            Err(ShmError::last_os_error("munmap", &self.name))
        };
        let unlinked = if self.owned {
            self.owned = false;
            unlink(&self.name)
        } else {
            Ok(())
        };
        unmapped.and(unlinked)
    }
}

impl Drop for ShmMapping {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to release shared segment");
        }
    }
}

impl std::fmt::Debug for ShmMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmMapping")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("owned", &self.owned)
            .field("mapped", &self.base.is_some())
            .finish()
    }
}

/// Remove a shared-memory name from the system namespace.
pub fn unlink(name: &CStr) -> Result<(), ShmError> {
    // SAFETY: `name` is a valid NUL-terminated string.
    if unsafe { libc::shm_unlink(name.as_ptr()) } == 0 {
        tracing::debug!(name = ?name, "unlinked shared segment");
        Ok(())
    } else {
        Err(ShmError::last_os_error("shm_unlink", name))
    }
}

fn map(file: &File, len: usize, name: &CStr) -> Result<NonNull<u8>, ShmError> {
    // SAFETY: mapping a regular shm descriptor of at least `len` bytes.
    let addr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(ShmError::last_os_error("mmap", name));
    }
    NonNull::new(addr.cast::<u8>())
        .ok_or_else(|| ShmError::io("mmap", name, io::Error::other("mmap returned null")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unique_name(tag: &str) -> CString {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        CString::new(format!("/tricolor_maptest_{}_{tag}_{n}", std::process::id())).unwrap()
    }

    #[test]
    fn created_segment_is_zeroed_and_shared() {
        let name = unique_name("shared");
        let owner = ShmMapping::create(&name, 4096).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(owner.as_ptr(), owner.size()) };
        assert!(bytes.iter().all(|&b| b == 0));

        let other = ShmMapping::open(&name).unwrap();
        assert_eq!(other.size(), 4096);
        unsafe { owner.as_ptr().add(10).write(0x5a) };
        assert_eq!(unsafe { other.as_ptr().add(10).read() }, 0x5a);

        other.close().unwrap();
        owner.close().unwrap();
        assert!(ShmMapping::open(&name).is_err());
    }

    #[test]
    fn create_is_exclusive() {
        let name = unique_name("excl");
        let owner = ShmMapping::create(&name, 64).unwrap();
        let err = ShmMapping::create(&name, 64).unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::AlreadyExists));
        // The failed create must not have unlinked the owner's name.
        ShmMapping::open(&name).unwrap().close().unwrap();
        owner.close().unwrap();
    }

    #[test]
    fn drop_unlinks_owned_name() {
        let name = unique_name("drop");
        drop(ShmMapping::create(&name, 64).unwrap());
        let err = ShmMapping::open(&name).unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
    }
}
