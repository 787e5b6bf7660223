//! Shared segment layout.
//!
//! ```text
//! +-------------------------------------------------------------------+
//! | RING HEADER (64 bytes)                                            |
//! |   magic (written last), version, capacity, slot_size              |
//! |   quit, write_pos, read_pos, active_producers                     |
//! +-------------------------------------------------------------------+
//! | SLOTS (RING_CAPACITY * size_of::<T>())                            |
//! +-------------------------------------------------------------------+
//! ```
//!
//! Slots hold plain `Copy` values; nothing that points into one process's
//! address space may be stored in them.

use std::cell::UnsafeCell;
use std::mem::{MaybeUninit, size_of};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::LayoutError;

/// Number of slots in the ring.
pub const RING_CAPACITY: usize = 50;

/// Magic bytes identifying an initialized tricolor segment.
pub const MAGIC: [u8; 8] = *b"TRICOLR\0";

/// Layout version (major.minor packed into u32).
pub const LAYOUT_VERSION: u32 = 1 << 16; // v1.0

const MAGIC_WORD: u64 = u64::from_le_bytes(MAGIC);

/// Control block at the start of the segment.
///
/// `magic` doubles as the readiness flag: the owner stores it with release
/// ordering only after every other field (and the semaphore triad) exists.
#[repr(C, align(64))]
pub struct RingHeader {
    pub magic: AtomicU64,
    pub version: u32,
    pub capacity: u32,
    pub slot_size: u32,
    _reserved: u32,

    /// 0 while running, 1 once shutdown was requested. Never reset.
    pub quit: AtomicU32,
    /// Next slot a producer writes. Only advanced under the write mutex.
    pub write_pos: AtomicU32,
    /// Next slot the consumer reads. Only advanced by the consumer.
    pub read_pos: AtomicU32,
    /// Producers attached and not yet detached.
    pub active_producers: AtomicU32,

    _pad: [u8; 24],
}

const _: () = assert!(size_of::<RingHeader>() == 64);

impl RingHeader {
    /// Initialize a fresh header. The magic stays zero until [`mark_ready`].
    ///
    /// [`mark_ready`]: RingHeader::mark_ready
    pub fn init(&mut self, slot_size: u32) {
        self.magic = AtomicU64::new(0);
        self.version = LAYOUT_VERSION;
        self.capacity = RING_CAPACITY as u32;
        self.slot_size = slot_size;
        self._reserved = 0;
        self.quit = AtomicU32::new(0);
        self.write_pos = AtomicU32::new(0);
        self.read_pos = AtomicU32::new(0);
        self.active_producers = AtomicU32::new(0);
        self._pad = [0; 24];
    }

    /// Publish the header to attaching processes.
    pub fn mark_ready(&self) {
        self.magic.store(MAGIC_WORD, Ordering::Release);
    }

    /// Validate a header written by another process.
    pub fn validate(&self, slot_size: u32) -> Result<(), LayoutError> {
        if self.magic.load(Ordering::Acquire) != MAGIC_WORD {
            return Err(LayoutError::InvalidMagic);
        }
        if self.version >> 16 != LAYOUT_VERSION >> 16 {
            return Err(LayoutError::IncompatibleVersion {
                expected: LAYOUT_VERSION,
                found: self.version,
            });
        }
        if self.capacity != RING_CAPACITY as u32 {
            return Err(LayoutError::CapacityMismatch {
                expected: RING_CAPACITY as u32,
                found: self.capacity,
            });
        }
        if self.slot_size != slot_size {
            return Err(LayoutError::SlotSizeMismatch {
                expected: slot_size,
                found: self.slot_size,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn is_quit(&self) -> bool {
        self.quit.load(Ordering::Acquire) != 0
    }

    /// Set the quit flag. Idempotent.
    #[inline]
    pub fn request_quit(&self) {
        self.quit.store(1, Ordering::Release);
    }
}

/// The whole shared segment: header followed by the slot array.
#[repr(C)]
pub struct SharedState<T> {
    pub header: RingHeader,
    slots: [UnsafeCell<MaybeUninit<T>>; RING_CAPACITY],
}

impl<T: Copy> SharedState<T> {
    /// Total segment size for a ring of `T`.
    pub const SIZE: usize = size_of::<Self>();

    /// Slot payload size recorded in (and checked against) the header.
    pub const SLOT_SIZE: u32 = size_of::<T>() as u32;

    /// Copy `value` into slot `index`.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive write access to the slot, which the
    /// semaphore protocol grants to the holder of the write mutex after it
    /// took a free-slot token.
    #[inline]
    pub unsafe fn write_slot(&self, index: usize, value: T) {
        unsafe { (*self.slots[index].get()).write(value) };
    }

    /// Copy the value out of slot `index`.
    ///
    /// # Safety
    ///
    /// The slot must have been written, and the caller must hold the
    /// used-slot token covering it.
    #[inline]
    pub unsafe fn read_slot(&self, index: usize) -> T {
        unsafe { (*self.slots[index].get()).assume_init() }
    }
}

/// Advance a cursor by one slot. Both cursors wrap at the slot capacity.
#[inline]
pub fn next_slot(index: u32) -> u32 {
    (index + 1) % RING_CAPACITY as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed_header() -> Box<RingHeader> {
        // SAFETY: every field of RingHeader is valid when zeroed.
        Box::new(unsafe { std::mem::zeroed() })
    }

    #[test]
    fn header_is_not_ready_until_marked() {
        let mut header = zeroed_header();
        header.init(8);
        assert_eq!(header.validate(8), Err(LayoutError::InvalidMagic));
        header.mark_ready();
        assert_eq!(header.validate(8), Ok(()));
    }

    #[test]
    fn header_rejects_other_geometry() {
        let mut header = zeroed_header();
        header.init(8);
        header.mark_ready();
        assert_eq!(
            header.validate(16),
            Err(LayoutError::SlotSizeMismatch {
                expected: 16,
                found: 8
            })
        );
        header.capacity = 8;
        assert_eq!(
            header.validate(8),
            Err(LayoutError::CapacityMismatch {
                expected: RING_CAPACITY as u32,
                found: 8
            })
        );
        header.capacity = RING_CAPACITY as u32;
        header.version = 2 << 16;
        assert!(matches!(
            header.validate(8),
            Err(LayoutError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn cursors_wrap_at_slot_capacity() {
        assert_eq!(next_slot(0), 1);
        assert_eq!(next_slot(7), 8);
        assert_eq!(next_slot(RING_CAPACITY as u32 - 1), 0);
    }

    #[test]
    fn quit_is_sticky() {
        let mut header = zeroed_header();
        header.init(8);
        assert!(!header.is_quit());
        header.request_quit();
        header.request_quit();
        assert!(header.is_quit());
    }

    #[test]
    fn segment_size_covers_header_and_slots() {
        let minimum = size_of::<RingHeader>() + RING_CAPACITY * size_of::<u64>();
        assert!(SharedState::<u64>::SIZE >= minimum);
        assert_eq!(SharedState::<u64>::SIZE % 64, 0);
    }
}
