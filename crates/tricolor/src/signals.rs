//! SIGINT / SIGTERM handling.
//!
//! The handler only stores to atomics: the process-local flag returned by
//! [`requested`] and, when one is routed with [`route_to_shared`], the quit
//! word of a shared segment. Everything else happens on the normal control
//! path once a loop observes the flag.

use std::io;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, Ordering};

/// Signals that request a cooperative shutdown.
pub const TERMINATION_SIGNALS: [libc::c_int; 2] = [libc::SIGINT, libc::SIGTERM];

static REQUESTED: AtomicBool = AtomicBool::new(false);
static SHARED_QUIT: AtomicPtr<AtomicU32> = AtomicPtr::new(ptr::null_mut());

extern "C" fn on_termination(_signal: libc::c_int) {
    REQUESTED.store(true, Ordering::SeqCst);
    let shared = SHARED_QUIT.load(Ordering::SeqCst);
    if !shared.is_null() {
        // SAFETY: `route_to_shared` guarantees the word outlives the route.
        unsafe { (*shared).store(1, Ordering::Release) };
    }
}

/// Install the handler for [`TERMINATION_SIGNALS`].
///
/// `SA_RESTART` is left off so a blocked semaphore wait returns `EINTR`
/// and gets to re-check its cancellation condition.
pub fn install() -> io::Result<()> {
    for signal in TERMINATION_SIGNALS {
        // SAFETY: a zeroed sigaction is a valid starting point; every field
        // we rely on is set below.
        let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
        action.sa_sigaction = on_termination as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        // SAFETY: `sa_mask` is a valid, owned signal set.
        unsafe { libc::sigemptyset(&mut action.sa_mask) };
        // SAFETY: `action` is fully initialized and the handler is
        // async-signal-safe.
        if unsafe { libc::sigaction(signal, &action, ptr::null_mut()) } != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    tracing::debug!("termination signal handlers installed");
    Ok(())
}

/// Whether a termination signal has arrived since start-up.
#[inline]
pub fn requested() -> bool {
    REQUESTED.load(Ordering::SeqCst)
}

/// Keeps a shared quit word routed to the signal handler. Dropping it
/// unroutes the word.
#[must_use = "the route is removed when the guard is dropped"]
#[derive(Debug)]
pub struct SharedQuitGuard {
    word: *mut AtomicU32,
}

/// Make the signal handler also store `1` into `word`.
///
/// Replaces any earlier route.
///
/// # Safety
///
/// `word` must stay valid (for a segment: stay mapped) until the returned
/// guard is dropped, and the guard must not be leaked.
pub unsafe fn route_to_shared(word: &AtomicU32) -> SharedQuitGuard {
    let word = ptr::from_ref(word).cast_mut();
    SHARED_QUIT.store(word, Ordering::SeqCst);
    if requested() {
        // A signal that arrived earlier still applies.
        // SAFETY: `word` is valid per the caller's contract.
        unsafe { (*word).store(1, Ordering::Release) };
    }
    SharedQuitGuard { word }
}

impl Drop for SharedQuitGuard {
    fn drop(&mut self) {
        let _ = SHARED_QUIT.compare_exchange(
            self.word,
            ptr::null_mut(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}
