//! The free-slots / used-slots / write-mutex semaphore triad.

use crate::error::ShmError;
use crate::names::RingNames;
use crate::semaphore::NamedSemaphore;

/// The three semaphores that implement the producer/consumer protocol.
///
/// - `free`: counting, starts at the ring capacity. Producers take one token
///   before writing; the consumer returns one after each read.
/// - `used`: counting, starts at zero. Producers add one token per completed
///   write; the consumer takes one per read.
/// - `write`: binary, starts at one. Serializes producers for the whole
///   "reserve, copy, advance, release" sequence.
#[derive(Debug)]
pub struct SemaphoreTriad {
    pub free: NamedSemaphore,
    pub used: NamedSemaphore,
    pub write: NamedSemaphore,
}

impl SemaphoreTriad {
    /// Create all three semaphores.
    ///
    /// If a later creation fails, the ones already created are dropped, which
    /// closes and unlinks them.
    pub fn create(names: &RingNames, capacity: u32) -> Result<Self, ShmError> {
        let free = NamedSemaphore::create(names.free(), capacity)?;
        let used = NamedSemaphore::create(names.used(), 0)?;
        let write = NamedSemaphore::create(names.write(), 1)?;
        Ok(Self { free, used, write })
    }

    /// Open all three semaphores created by the owner.
    pub fn open(names: &RingNames) -> Result<Self, ShmError> {
        Ok(Self {
            free: NamedSemaphore::open(names.free())?,
            used: NamedSemaphore::open(names.used())?,
            write: NamedSemaphore::open(names.write())?,
        })
    }

    /// Close all three handles (unlinking owned names), reporting the first
    /// failure after attempting every close.
    pub fn close(self) -> Result<(), ShmError> {
        let Self { free, used, write } = self;
        let free = free.close();
        let used = used.close();
        let write = write.close();
        free.and(used).and(write)
    }
}
