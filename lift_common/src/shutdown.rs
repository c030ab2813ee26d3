//! Process shutdown wiring shared by the long-running binaries.
//!
//! SIGINT sets a process-wide flag and broadcasts the registered region
//! condvar so untimed waiters (the safety monitor) wake and observe the
//! flag. SIGPIPE is ignored process-wide so a broken socket surfaces as a
//! write error and is handled by connection teardown.

use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);
static WAKE_COND: AtomicPtr<libc::pthread_cond_t> = AtomicPtr::new(std::ptr::null_mut());

extern "C" fn on_sigint(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
    let cond = WAKE_COND.load(Ordering::SeqCst);
    if !cond.is_null() {
        // Untimed waiters only wake on a broadcast, so the handler must
        // issue one itself.
        unsafe { libc::pthread_cond_broadcast(cond) };
    }
}

/// Install the SIGINT handler and ignore SIGPIPE.
///
/// `wake` is the region condvar to broadcast from the handler, if the
/// process blocks on one; it must outlive the process's signal handling.
pub fn install(wake: Option<*mut libc::pthread_cond_t>) -> nix::Result<()> {
    if let Some(cond) = wake {
        WAKE_COND.store(cond, Ordering::SeqCst);
    }
    unsafe {
        signal::signal(Signal::SIGPIPE, SigHandler::SigIgn)?;
        let action = SigAction::new(
            SigHandler::Handler(on_sigint),
            SaFlags::empty(),
            SigSet::empty(),
        );
        signal::sigaction(Signal::SIGINT, &action)?;
    }
    Ok(())
}

/// Whether SIGINT has been received.
#[inline]
pub fn requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Trip the shutdown flag from inside the process (used when a fatal
/// condition should wind the main loops down the same way SIGINT does).
pub fn trigger() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}
