//! System-visible names for the shared segment and the semaphore triad.

use std::ffi::{CStr, CString};

use crate::error::ShmError;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "tricolor";

/// The four names a ring occupies in the POSIX IPC namespace.
///
/// All four are derived from one namespace string, so independent runs (and
/// tests) can coexist on the same host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingNames {
    namespace: String,
    shm: CString,
    free: CString,
    used: CString,
    write: CString,
}

impl RingNames {
    /// Derive `/<ns>_shm`, `/<ns>_free`, `/<ns>_used` and `/<ns>_write`.
    pub fn new(namespace: &str) -> Result<Self, ShmError> {
        if namespace.is_empty() || namespace.contains('/') {
            return Err(ShmError::InvalidName(namespace.to_string()));
        }
        let make = |suffix: &str| {
            CString::new(format!("/{namespace}_{suffix}"))
                .map_err(|_| ShmError::InvalidName(namespace.to_string()))
        };
        Ok(Self {
            namespace: namespace.to_string(),
            shm: make("shm")?,
            free: make("free")?,
            used: make("used")?,
            write: make("write")?,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the shared-memory segment.
    pub fn shm(&self) -> &CStr {
        &self.shm
    }

    /// Name of the free-slots counting semaphore.
    pub fn free(&self) -> &CStr {
        &self.free
    }

    /// Name of the used-slots counting semaphore.
    pub fn used(&self) -> &CStr {
        &self.used
    }

    /// Name of the binary write-mutex semaphore.
    pub fn write(&self) -> &CStr {
        &self.write
    }
}

impl Default for RingNames {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE).expect("default namespace is valid")
    }
}
