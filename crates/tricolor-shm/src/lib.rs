//! Shared-memory primitives for a multi-process producer/consumer ring.
//!
//! One consumer process creates a fixed-capacity ring in a POSIX
//! shared-memory segment, together with three named semaphores. Any number
//! of unrelated producer processes attach by name and publish `Copy` values
//! into it.
//!
//! # Components
//!
//! - [`NamedSemaphore`]: a `sem_open` semaphore; `EINTR` is retried, and
//!   waits can be made cancellable.
//! - [`SemaphoreTriad`]: free-slots, used-slots and write-mutex semaphores.
//! - [`ShmMapping`]: a `shm_open` + `mmap` segment.
//! - [`SharedState`] / [`RingHeader`]: the `repr(C)` segment layout.
//! - [`RingOwner`] / [`RingProducer`]: the consumer and producer sides.
//!
//! # Protocol
//!
//! ```text
//! publish:  wait(write) -> wait(free) -> slots[write_pos] = v
//!           -> write_pos = (write_pos + 1) % C -> post(used) -> post(write)
//! consume:  wait(used) -> v = slots[read_pos]
//!           -> read_pos = (read_pos + 1) % C -> post(free)
//! shutdown: quit = 1 -> post(free) x active_producers -> close + unlink all
//! ```
//!
//! The owner is the only process that creates or removes system names.
//! Processes that crash while holding the write mutex stall the ring; that
//! is not recovered from.

pub mod error;
pub mod layout;
pub mod mapping;
pub mod names;
pub mod ring;
pub mod semaphore;
pub mod triad;

pub use error::{LayoutError, ShmError};
pub use layout::{LAYOUT_VERSION, MAGIC, RING_CAPACITY, RingHeader, SharedState};
pub use mapping::ShmMapping;
pub use names::{DEFAULT_NAMESPACE, RingNames};
pub use ring::{Publish, RingOwner, RingProducer, RingStatus, ShutdownReport};
pub use semaphore::{NamedSemaphore, WAIT_POLL_INTERVAL, Wait};
pub use triad::SemaphoreTriad;
