//! Process-shared mutex and condition variable embedded in the region ABI.
//!
//! The primitives live inside the mapped region itself, so three distinct
//! processes (car, safety monitor, maintenance tool) contend on the same
//! kernel objects. The owner initializes them `PTHREAD_PROCESS_SHARED`
//! before any other process attaches; attachers never initialize or destroy.
//! Timed waits use `CLOCK_MONOTONIC`, configured on the condvar at init.

use std::mem;
use std::time::Duration;

use nix::errno::Errno;

/// Outcome of a bounded wait on the region condvar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Woken by a broadcast (or spuriously).
    Signaled,
    /// The deadline passed first.
    TimedOut,
}

/// The synchronization block at the front of every car region.
#[repr(C)]
pub struct RegionSync {
    mutex: libc::pthread_mutex_t,
    cond: libc::pthread_cond_t,
}

fn check(rc: libc::c_int) -> Result<(), Errno> {
    if rc == 0 {
        Ok(())
    } else {
        Err(Errno::from_raw(rc))
    }
}

impl RegionSync {
    /// Initialize the primitives in place. Owner only, exactly once, before
    /// the region name is published to other processes.
    ///
    /// # Safety
    /// `this` must point at writable, correctly aligned region memory.
    pub(crate) unsafe fn init(this: *mut RegionSync) -> Result<(), Errno> {
        let mut mattr: libc::pthread_mutexattr_t = mem::zeroed();
        check(libc::pthread_mutexattr_init(&mut mattr))?;
        check(libc::pthread_mutexattr_setpshared(
            &mut mattr,
            libc::PTHREAD_PROCESS_SHARED,
        ))?;
        let rc = libc::pthread_mutex_init(&mut (*this).mutex, &mattr);
        libc::pthread_mutexattr_destroy(&mut mattr);
        check(rc)?;

        let mut cattr: libc::pthread_condattr_t = mem::zeroed();
        check(libc::pthread_condattr_init(&mut cattr))?;
        check(libc::pthread_condattr_setpshared(
            &mut cattr,
            libc::PTHREAD_PROCESS_SHARED,
        ))?;
        check(libc::pthread_condattr_setclock(
            &mut cattr,
            libc::CLOCK_MONOTONIC,
        ))?;
        let rc = libc::pthread_cond_init(&mut (*this).cond, &cattr);
        libc::pthread_condattr_destroy(&mut cattr);
        check(rc)
    }

    /// Destroy the primitives. Owner only, after all attachers are gone.
    ///
    /// # Safety
    /// `this` must point at primitives previously set up by [`Self::init`],
    /// with no thread blocked on them.
    pub(crate) unsafe fn destroy(this: *mut RegionSync) {
        let _ = libc::pthread_mutex_destroy(&mut (*this).mutex);
        let _ = libc::pthread_cond_destroy(&mut (*this).cond);
    }

    /// # Safety
    /// `this` must point at initialized primitives.
    pub(crate) unsafe fn lock(this: *mut RegionSync) {
        let rc = libc::pthread_mutex_lock(&mut (*this).mutex);
        assert_eq!(rc, 0, "region mutex lock failed: {}", Errno::from_raw(rc));
    }

    /// # Safety
    /// The calling thread must hold the lock.
    pub(crate) unsafe fn unlock(this: *mut RegionSync) {
        let rc = libc::pthread_mutex_unlock(&mut (*this).mutex);
        assert_eq!(rc, 0, "region mutex unlock failed: {}", Errno::from_raw(rc));
    }

    /// # Safety
    /// `this` must point at initialized primitives.
    pub(crate) unsafe fn broadcast(this: *mut RegionSync) {
        let rc = libc::pthread_cond_broadcast(&mut (*this).cond);
        assert_eq!(rc, 0, "region cond broadcast failed: {}", Errno::from_raw(rc));
    }

    /// Block until broadcast. No timeout; shutdown must broadcast to unblock.
    ///
    /// # Safety
    /// The calling thread must hold the lock.
    pub(crate) unsafe fn wait(this: *mut RegionSync) {
        let rc = libc::pthread_cond_wait(&mut (*this).cond, &mut (*this).mutex);
        assert_eq!(rc, 0, "region cond wait failed: {}", Errno::from_raw(rc));
    }

    /// Block until broadcast or until `timeout` elapses.
    ///
    /// # Safety
    /// The calling thread must hold the lock.
    pub(crate) unsafe fn wait_timeout(this: *mut RegionSync, timeout: Duration) -> WaitOutcome {
        let deadline = monotonic_deadline(timeout);
        Self::wait_until(this, &deadline)
    }

    /// Block until broadcast or until the absolute `CLOCK_MONOTONIC`
    /// `deadline` passes.
    ///
    /// # Safety
    /// The calling thread must hold the lock.
    pub(crate) unsafe fn wait_until(
        this: *mut RegionSync,
        deadline: &libc::timespec,
    ) -> WaitOutcome {
        let rc = libc::pthread_cond_timedwait(&mut (*this).cond, &mut (*this).mutex, deadline);
        match rc {
            0 => WaitOutcome::Signaled,
            libc::ETIMEDOUT => WaitOutcome::TimedOut,
            other => panic!(
                "region cond timedwait failed: {}",
                Errno::from_raw(other)
            ),
        }
    }

    /// Raw pointer to the condvar, for the signal handler's wake broadcast.
    pub(crate) fn cond_ptr(this: *mut RegionSync) -> *mut libc::pthread_cond_t {
        // Field projection only; no dereference happens here.
        unsafe { std::ptr::addr_of_mut!((*this).cond) }
    }
}

/// Absolute `CLOCK_MONOTONIC` timespec `timeout` from now.
pub(crate) fn monotonic_deadline(timeout: Duration) -> libc::timespec {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // clock_gettime on CLOCK_MONOTONIC cannot fail with a valid timespec.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut now) };

    let mut sec = now.tv_sec + timeout.as_secs() as libc::time_t;
    let mut nsec = now.tv_nsec + timeout.subsec_nanos() as libc::c_long;
    if nsec >= 1_000_000_000 {
        sec += 1;
        nsec -= 1_000_000_000;
    }
    libc::timespec {
        tv_sec: sec,
        tv_nsec: nsec,
    }
}
