//! Multi-producer, single-consumer ring across processes.
//!
//! - [`RingOwner`]: created by the consumer process. Owns every system name
//!   (segment and semaphores), reads values, and drives shutdown.
//! - [`RingProducer`]: used by producer processes to attach to an existing
//!   ring and publish values.
//!
//! Writers are serialized by the write mutex; the free/used semaphore pair
//! bounds the number of unread values to [`RING_CAPACITY`].

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{LayoutError, ShmError};
use crate::layout::{RING_CAPACITY, RingHeader, SharedState, next_slot};
use crate::mapping::ShmMapping;
use crate::names::RingNames;
use crate::semaphore::Wait;
use crate::triad::SemaphoreTriad;

/// Outcome of [`RingProducer::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The value was copied into `slot`.
    Published { slot: u32 },
    /// Shutdown was requested before a slot could be reserved; nothing was written.
    Cancelled,
}

impl Publish {
    #[inline]
    pub fn is_cancelled(self) -> bool {
        matches!(self, Publish::Cancelled)
    }
}

/// Snapshot of the ring's control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStatus {
    /// Value of the free-slots semaphore.
    pub free: u32,
    /// Value of the used-slots semaphore (published but unread values).
    pub used: u32,
    pub write_pos: u32,
    pub read_pos: u32,
    pub active_producers: u32,
    pub quit: bool,
}

impl std::fmt::Display for RingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "free={} used={} write={} read={} producers={} quit={}",
            self.free, self.used, self.write_pos, self.read_pos, self.active_producers, self.quit
        )
    }
}

/// What a completed [`RingOwner::shutdown`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Free-slot tokens posted to wake parked producers.
    pub producers_released: u32,
}

/// Typed view of a mapped segment.
struct Segment<T> {
    mapping: ShmMapping,
    state: NonNull<SharedState<T>>,
}

// SAFETY: all access to the shared state goes through atomics or through
// slots guarded by the semaphore protocol.
unsafe impl<T: Send> Send for Segment<T> {}
unsafe impl<T: Send> Sync for Segment<T> {}

impl<T: Copy> Segment<T> {
    fn new(mapping: ShmMapping) -> Self {
        let state = NonNull::new(mapping.as_ptr().cast::<SharedState<T>>())
            .expect("mmap never yields a null base");
        Self { mapping, state }
    }

    #[inline]
    fn state(&self) -> &SharedState<T> {
        // SAFETY: the mapping is at least `SharedState::<T>::SIZE` bytes
        // (checked on create/attach) and stays mapped while `self` lives.
        unsafe { self.state.as_ref() }
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        &self.state().header
    }
}

fn read_status(header: &RingHeader, sems: &SemaphoreTriad) -> Result<RingStatus, ShmError> {
    Ok(RingStatus {
        free: sems.free.value()?,
        used: sems.used.value()?,
        write_pos: header.write_pos.load(Ordering::Acquire),
        read_pos: header.read_pos.load(Ordering::Acquire),
        active_producers: header.active_producers.load(Ordering::Acquire),
        quit: header.is_quit(),
    })
}

// =============================================================================
// Owner (consumer side)
// =============================================================================

/// Consumer-side handle. Creates and owns all four system names.
///
/// Dropping the owner runs [`shutdown`](RingOwner::shutdown) if it has not
/// been run yet.
pub struct RingOwner<T: Copy> {
    names: RingNames,
    /// `None` once shut down.
    resources: Option<(Segment<T>, SemaphoreTriad)>,
    report: Option<ShutdownReport>,
}

impl<T: Copy> RingOwner<T> {
    /// Create the semaphores and the zero-initialized segment, then mark the
    /// segment ready for producers.
    ///
    /// Fails if any of the names already exist. Anything created before the
    /// failure is unlinked again.
    pub fn create(names: &RingNames) -> Result<Self, ShmError> {
        let sems = SemaphoreTriad::create(names, RING_CAPACITY as u32)?;
        let mapping = ShmMapping::create(names.shm(), SharedState::<T>::SIZE)?;
        let segment = Segment::<T>::new(mapping);

        // SAFETY: the segment was just created by us; no other process can
        // validate it before `mark_ready`, so this is the only reference.
        let header = unsafe { &mut (*segment.state.as_ptr()).header };
        header.init(SharedState::<T>::SLOT_SIZE);
        segment.header().mark_ready();

        tracing::info!(
            namespace = names.namespace(),
            capacity = RING_CAPACITY,
            slot_size = SharedState::<T>::SLOT_SIZE,
            "ring created"
        );

        Ok(Self {
            names: names.clone(),
            resources: Some((segment, sems)),
            report: None,
        })
    }

    fn header(&self) -> Option<&RingHeader> {
        self.resources.as_ref().map(|(segment, _)| segment.header())
    }

    /// Whether quit has been requested (always true after shutdown).
    pub fn is_quit(&self) -> bool {
        self.header().is_none_or(RingHeader::is_quit)
    }

    /// Set the shared quit flag. Idempotent.
    pub fn request_quit(&self) {
        if let Some(header) = self.header() {
            header.request_quit();
        }
    }

    /// The shared quit word, for routing an asynchronous termination signal
    /// straight into the segment. `None` after shutdown.
    pub fn quit_word(&self) -> Option<&AtomicU32> {
        self.header().map(|header| &header.quit)
    }

    /// Number of producers currently attached.
    pub fn active_producers(&self) -> u32 {
        self.header()
            .map_or(0, |h| h.active_producers.load(Ordering::Acquire))
    }

    /// Take the next published value, blocking until one is available.
    ///
    /// Returns `Ok(None)` without consuming anything if quit was requested
    /// (through the segment or through `cancelled`) while no value was
    /// pending, or if the ring was already shut down.
    pub fn consume(&mut self, cancelled: impl Fn() -> bool) -> Result<Option<T>, ShmError> {
        let Some((segment, sems)) = self.resources.as_ref() else {
            return Ok(None);
        };
        let header = segment.header();

        if sems.used.wait_until(|| cancelled() || header.is_quit())? == Wait::Cancelled {
            return Ok(None);
        }

        let pos = header.read_pos.load(Ordering::Relaxed);
        // SAFETY: the used-slot token we hold covers slot `pos`, which the
        // producer finished writing before posting that token.
        let value = unsafe { segment.state().read_slot(pos as usize) };
        header.read_pos.store(next_slot(pos), Ordering::Release);
        sems.free.post()?;

        tracing::trace!(slot = pos, "consumed");
        Ok(Some(value))
    }

    /// Snapshot of the control state. `None` after shutdown.
    pub fn status(&self) -> Result<Option<RingStatus>, ShmError> {
        match self.resources.as_ref() {
            Some((segment, sems)) => read_status(segment.header(), sems).map(Some),
            None => Ok(None),
        }
    }

    /// Request quit, wake every parked producer, then close and unlink all
    /// semaphores and the segment.
    ///
    /// One free-slot token is posted per attached producer. A producer that
    /// attaches after the count is read may stay parked; that race is
    /// accepted.
    ///
    /// Calling this again returns the first report and touches nothing.
    pub fn shutdown(&mut self) -> Result<ShutdownReport, ShmError> {
        if let Some(report) = self.report {
            return Ok(report);
        }
        let Some((segment, sems)) = self.resources.take() else {
            return Ok(ShutdownReport::default());
        };

        let header = segment.header();
        header.request_quit();
        let producers = header.active_producers.load(Ordering::Acquire);

        let mut first_error = None;
        let mut released = 0;
        for _ in 0..producers {
            match sems.free.post() {
                Ok(()) => released += 1,
                Err(e) => {
                    first_error = Some(e);
                    break;
                }
            }
        }

        if let Ok(status) = read_status(header, &sems) {
            tracing::debug!(%status, "ring status at shutdown");
        }

        let closed_sems = sems.close();
        let closed_segment = segment.mapping.close();

        let report = ShutdownReport {
            producers_released: released,
        };
        self.report = Some(report);
        tracing::info!(
            namespace = self.names.namespace(),
            producers_released = released,
            "ring shut down"
        );

        match first_error {
            Some(e) => Err(e),
            None => closed_sems.and(closed_segment).map(|()| report),
        }
    }
}

impl<T: Copy> Drop for RingOwner<T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "ring shutdown on drop failed");
        }
    }
}

// =============================================================================
// Producer
// =============================================================================

/// Producer-side handle to a ring created by another process.
///
/// Attaching does not count the producer; call
/// [`register`](RingProducer::register) to be included in the shutdown
/// wake-up fan-out. Dropping the handle detaches it.
pub struct RingProducer<T: Copy> {
    segment: Option<Segment<T>>,
    sems: Option<SemaphoreTriad>,
    registered: bool,
}

impl<T: Copy> RingProducer<T> {
    /// Map the segment, validate it, and open the three semaphores.
    pub fn open(names: &RingNames) -> Result<Self, ShmError> {
        let mapping = ShmMapping::open(names.shm())?;
        if mapping.size() < SharedState::<T>::SIZE {
            return Err(LayoutError::TooSmall {
                expected: SharedState::<T>::SIZE,
                found: mapping.size(),
            }
            .into());
        }
        let segment = Segment::<T>::new(mapping);
        segment.header().validate(SharedState::<T>::SLOT_SIZE)?;
        let sems = SemaphoreTriad::open(names)?;

        tracing::debug!(namespace = names.namespace(), "attached to ring");
        Ok(Self {
            segment: Some(segment),
            sems: Some(sems),
            registered: false,
        })
    }

    fn parts(&self) -> (&Segment<T>, &SemaphoreTriad) {
        match (&self.segment, &self.sems) {
            (Some(segment), Some(sems)) => (segment, sems),
            _ => unreachable!("producer resources are only taken by detach"),
        }
    }

    /// Count this producer in the shared active-producer tally. Idempotent.
    pub fn register(&mut self) {
        if !self.registered {
            self.parts()
                .0
                .header()
                .active_producers
                .fetch_add(1, Ordering::AcqRel);
            self.registered = true;
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Whether the consumer requested quit.
    pub fn is_quit(&self) -> bool {
        self.parts().0.header().is_quit()
    }

    /// Copy `value` into the next free slot.
    ///
    /// Blocks while another producer holds the write mutex or while the ring
    /// is full. Gives up with [`Publish::Cancelled`] (writing nothing) once
    /// quit is requested through the segment or through `cancelled`. A
    /// free-slot token taken during shutdown is handed back, so the next
    /// parked producer wakes as well.
    pub fn publish(&self, value: T, cancelled: impl Fn() -> bool) -> Result<Publish, ShmError> {
        let (segment, sems) = self.parts();
        let header = segment.header();
        let stop = || cancelled() || header.is_quit();

        if sems.write.wait_until(&stop)?.is_cancelled() {
            return Ok(Publish::Cancelled);
        }
        if header.is_quit() {
            sems.write.post()?;
            return Ok(Publish::Cancelled);
        }

        match sems.free.wait_until(&stop) {
            Ok(Wait::Acquired) => {}
            Ok(Wait::Cancelled) => {
                sems.write.post()?;
                return Ok(Publish::Cancelled);
            }
            Err(e) => {
                let _ = sems.write.post();
                return Err(e);
            }
        }
        if header.is_quit() {
            let handed_back = sems.free.post();
            sems.write.post()?;
            handed_back?;
            return Ok(Publish::Cancelled);
        }

        let pos = header.write_pos.load(Ordering::Relaxed);
        // SAFETY: we hold the write mutex and a free-slot token, so slot
        // `pos` is unread-free and no other producer writes it.
        unsafe { segment.state().write_slot(pos as usize, value) };
        header.write_pos.store(next_slot(pos), Ordering::Release);

        sems.used.post()?;
        sems.write.post()?;

        tracing::trace!(slot = pos, "published");
        Ok(Publish::Published { slot: pos })
    }

    /// Snapshot of the control state.
    pub fn status(&self) -> Result<RingStatus, ShmError> {
        let (segment, sems) = self.parts();
        read_status(segment.header(), sems)
    }

    /// Unregister, unmap the segment and close the semaphore handles.
    /// The system names are left for the owner to remove.
    pub fn detach(mut self) -> Result<(), ShmError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), ShmError> {
        let Some(segment) = self.segment.take() else {
            return Ok(());
        };
        if self.registered {
            self.registered = false;
            let _ = segment.header().active_producers.fetch_update(
                Ordering::AcqRel,
                Ordering::Acquire,
                |n| n.checked_sub(1),
            );
        }
        let unmapped = segment.mapping.close();
        let closed = match self.sems.take() {
            Some(sems) => sems.close(),
            None => Ok(()),
        };
        tracing::debug!("detached from ring");
        unmapped.and(closed)
    }
}

impl<T: Copy> Drop for RingProducer<T> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "detaching from ring failed");
        }
    }
}
