//! Error types for shared-memory and semaphore operations.

use std::ffi::CStr;
use std::io;

/// Errors from creating, attaching to, or operating on the shared ring.
#[derive(Debug)]
pub enum ShmError {
    /// A system call failed.
    Io {
        /// The failing operation (`sem_open`, `mmap`, ...).
        op: &'static str,
        /// The system name the operation targeted.
        name: String,
        source: io::Error,
    },
    /// The shared segment exists but does not describe a compatible ring.
    Layout(LayoutError),
    /// A system name is not of the form `/name` or contains a NUL byte.
    InvalidName(String),
}

impl ShmError {
    pub(crate) fn io(op: &'static str, name: &CStr, source: io::Error) -> Self {
        Self::Io {
            op,
            name: name.to_string_lossy().into_owned(),
            source,
        }
    }

    pub(crate) fn last_os_error(op: &'static str, name: &CStr) -> Self {
        Self::io(op, name, io::Error::last_os_error())
    }

    /// The underlying OS error kind, if this is an I/O failure.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { op, name, source } => write!(f, "{op} failed for {name}: {source}"),
            Self::Layout(e) => write!(f, "layout error: {e}"),
            Self::InvalidName(name) => write!(f, "invalid system name: {name:?}"),
        }
    }
}

impl std::error::Error for ShmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Layout(e) => Some(e),
            Self::InvalidName(_) => None,
        }
    }
}

impl From<LayoutError> for ShmError {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

/// Validation failures for an attached segment header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The segment is smaller than the ring it should hold.
    TooSmall { expected: usize, found: usize },
    /// Magic bytes are missing; the owner has not finished initializing.
    InvalidMagic,
    /// Major version differs.
    IncompatibleVersion { expected: u32, found: u32 },
    /// Slot capacity differs from this build.
    CapacityMismatch { expected: u32, found: u32 },
    /// Slot payload size differs from this build.
    SlotSizeMismatch { expected: u32, found: u32 },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooSmall { expected, found } => {
                write!(f, "segment is {found} bytes, need {expected}")
            }
            Self::InvalidMagic => write!(f, "invalid magic bytes (segment not initialized)"),
            Self::IncompatibleVersion { expected, found } => write!(
                f,
                "incompatible version: expected {}.{}, found {}.{}",
                expected >> 16,
                expected & 0xffff,
                found >> 16,
                found & 0xffff
            ),
            Self::CapacityMismatch { expected, found } => {
                write!(f, "slot capacity mismatch: expected {expected}, found {found}")
            }
            Self::SlotSizeMismatch { expected, found } => {
                write!(f, "slot size mismatch: expected {expected}, found {found}")
            }
        }
    }
}

impl std::error::Error for LayoutError {}
