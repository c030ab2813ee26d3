//! A car's cross-process shared state region.
//!
//! One POSIX shared memory object per car, named `/car<name>`, holding a
//! process-shared lock + condvar and a small fixed block of ASCII fields and
//! flags (see [`layout`]). The car owns the object (creates it at startup,
//! unlinks it at shutdown); the controller, safety monitor, and maintenance
//! tool attach read-write but never create or destroy.
//!
//! The lock is the sole arbiter of field access: [`SharedRegion::lock`]
//! returns a guard that dereferences to [`RegionFields`] and carries the
//! wait/notify operations, so there is no way to touch a field without
//! holding the lock.

pub mod layout;
pub mod sync;

use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::mman::{self, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd;
use thiserror::Error;

use crate::consts::REGION_PREFIX;
use crate::floor::Floor;

pub use layout::{RegionFields, RegionLayout, FLOOR_LEN, STATUS_LEN};
pub use sync::WaitOutcome;

use sync::RegionSync;

/// Errors raised while creating or attaching a region.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The named object does not exist — the car is not running.
    #[error("no shared region for car '{name}'")]
    NoSuchCar {
        /// Car name as given on the command line.
        name: String,
    },
    /// System-level failure from `shm_open`/`ftruncate`/`mmap` or the
    /// primitive initialization.
    #[error("region '{object}': {source}")]
    Os {
        /// Kernel object name, e.g. `/carAlpha`.
        object: String,
        /// Underlying errno.
        source: Errno,
    },
}

/// Whether this process created the region or merely attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Owner,
    Attached,
}

/// A mapped car region, owner or attacher.
pub struct SharedRegion {
    ptr: NonNull<RegionLayout>,
    map_len: usize,
    object: String,
    role: Role,
}

// SAFETY: the mapping is shared between processes by design; within this
// process every field access goes through the guard, which holds the
// process-shared mutex.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("object", &self.object)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

fn object_name(car_name: &str) -> String {
    format!("{REGION_PREFIX}{car_name}")
}

fn os_err(object: &str) -> impl Fn(Errno) -> RegionError + '_ {
    move |source| RegionError::Os {
        object: object.to_string(),
        source,
    }
}

impl SharedRegion {
    /// Create (or re-create over a stale object) the region for `car_name`,
    /// initialize the process-shared primitives, and write the startup image
    /// parked at `initial`. Car startup only.
    pub fn create(car_name: &str, initial: Floor) -> Result<Self, RegionError> {
        let object = object_name(car_name);
        let map_len = core::mem::size_of::<RegionLayout>();

        let fd = mman::shm_open(
            object.as_str(),
            nix::fcntl::OFlag::O_CREAT | nix::fcntl::OFlag::O_RDWR,
            Mode::from_bits_truncate(0o666),
        )
        .map_err(os_err(&object))?;

        unistd::ftruncate(&fd, map_len as libc::off_t).map_err(|e| {
            let _ = mman::shm_unlink(object.as_str());
            RegionError::Os {
                object: object.clone(),
                source: e,
            }
        })?;

        let map_ptr = unsafe {
            mman::mmap(
                None,
                NonZeroUsize::new(map_len).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &fd,
                0,
            )
            .map_err(|e| {
                let _ = mman::shm_unlink(object.as_str());
                RegionError::Os {
                    object: object.clone(),
                    source: e,
                }
            })?
        };
        let ptr = map_ptr.cast::<RegionLayout>();

        unsafe {
            RegionSync::init(std::ptr::addr_of_mut!((*ptr.as_ptr()).sync)).map_err(|e| {
                let _ = mman::munmap(map_ptr, map_len);
                let _ = mman::shm_unlink(object.as_str());
                RegionError::Os {
                    object: object.clone(),
                    source: e,
                }
            })?;
            std::ptr::addr_of_mut!((*ptr.as_ptr()).fields)
                .write(RegionFields::starting_at(initial));
        }

        // fd can close now; the mapping keeps the object alive.
        drop(fd);

        Ok(Self {
            ptr,
            map_len,
            object,
            role: Role::Owner,
        })
    }

    /// Attach to an existing region. Controller, safety monitor, and
    /// maintenance tool path; never initializes or unlinks.
    pub fn attach(car_name: &str) -> Result<Self, RegionError> {
        let object = object_name(car_name);
        let map_len = core::mem::size_of::<RegionLayout>();

        let fd = mman::shm_open(
            object.as_str(),
            nix::fcntl::OFlag::O_RDWR,
            Mode::empty(),
        )
        .map_err(|e| {
            if e == Errno::ENOENT {
                RegionError::NoSuchCar {
                    name: car_name.to_string(),
                }
            } else {
                RegionError::Os {
                    object: object.clone(),
                    source: e,
                }
            }
        })?;

        // A smaller object than the layout would make field access run off
        // the mapping.
        let stat = nix::sys::stat::fstat(std::os::fd::AsRawFd::as_raw_fd(&fd))
            .map_err(os_err(&object))?;
        if (stat.st_size as usize) < map_len {
            return Err(RegionError::Os {
                object,
                source: Errno::EINVAL,
            });
        }

        let map_ptr = unsafe {
            mman::mmap(
                None,
                NonZeroUsize::new(map_len).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &fd,
                0,
            )
            .map_err(os_err(&object))?
        };

        Ok(Self {
            ptr: map_ptr.cast(),
            map_len,
            object,
            role: Role::Attached,
        })
    }

    /// Kernel object name, e.g. `/carAlpha`.
    #[inline]
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Take the region lock.
    pub fn lock(&self) -> RegionGuard<'_> {
        unsafe { RegionSync::lock(self.sync_ptr()) };
        RegionGuard { region: self }
    }

    /// Raw pointer to the region condvar, for the SIGINT handler's wake
    /// broadcast. The pointer stays valid for the life of the mapping.
    pub fn cond_ptr(&self) -> *mut libc::pthread_cond_t {
        RegionSync::cond_ptr(self.sync_ptr())
    }

    /// Unlink the kernel object now (owner only; no-op for attachers).
    /// The mapping stays valid for already-attached processes; `Drop`
    /// tolerates the second unlink failing.
    pub fn unlink(&self) {
        if self.role == Role::Owner {
            let _ = mman::shm_unlink(self.object.as_str());
        }
    }

    fn sync_ptr(&self) -> *mut RegionSync {
        unsafe { std::ptr::addr_of_mut!((*self.ptr.as_ptr()).sync) }
    }

    fn fields_ptr(&self) -> *mut RegionFields {
        unsafe { std::ptr::addr_of_mut!((*self.ptr.as_ptr()).fields) }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if self.role == Role::Owner {
            unsafe { RegionSync::destroy(self.sync_ptr()) };
        }
        unsafe {
            let _ = mman::munmap(self.ptr.cast(), self.map_len);
        }
        if self.role == Role::Owner {
            let _ = mman::shm_unlink(self.object.as_str());
        }
    }
}

/// Holds the region lock; dereferences to the guarded fields.
pub struct RegionGuard<'a> {
    region: &'a SharedRegion,
}

impl RegionGuard<'_> {
    /// Wake every process blocked on the region condvar.
    pub fn notify_all(&self) {
        unsafe { RegionSync::broadcast(self.region.sync_ptr()) };
    }

    /// Block until a broadcast. The lock is released while waiting and
    /// re-held on return.
    pub fn wait(&mut self) {
        unsafe { RegionSync::wait(self.region.sync_ptr()) };
    }

    /// Block until a broadcast or until `timeout` elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) -> WaitOutcome {
        unsafe { RegionSync::wait_timeout(self.region.sync_ptr(), timeout) }
    }

    /// Block until a broadcast or until the absolute monotonic `deadline`.
    pub fn wait_until(&mut self, deadline: &libc::timespec) -> WaitOutcome {
        unsafe { RegionSync::wait_until(self.region.sync_ptr(), deadline) }
    }
}

impl Deref for RegionGuard<'_> {
    type Target = RegionFields;

    fn deref(&self) -> &RegionFields {
        unsafe { &*self.region.fields_ptr() }
    }
}

impl DerefMut for RegionGuard<'_> {
    fn deref_mut(&mut self) -> &mut RegionFields {
        unsafe { &mut *self.region.fields_ptr() }
    }
}

impl Drop for RegionGuard<'_> {
    fn drop(&mut self) {
        unsafe { RegionSync::unlock(self.region.sync_ptr()) };
    }
}

/// Compute an absolute monotonic deadline `timeout` from now, for repeated
/// [`RegionGuard::wait_until`] calls against one fixed deadline.
pub fn deadline_after(timeout: Duration) -> libc::timespec {
    sync::monotonic_deadline(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::DoorState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    fn unique_name(tag: &str) -> String {
        format!(
            "test_{tag}_{}_{}",
            std::process::id(),
            NEXT_ID.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn floor(level: i16) -> Floor {
        Floor::new(level).unwrap()
    }

    #[test]
    fn create_attach_share_fields() {
        let name = unique_name("share");
        let owner = SharedRegion::create(&name, floor(3)).unwrap();
        let viewer = SharedRegion::attach(&name).unwrap();

        {
            let guard = viewer.lock();
            assert_eq!(guard.status_str(), "Closed");
            assert_eq!(guard.current_str(), "3");
        }
        {
            let mut guard = owner.lock();
            guard.set_door_state(DoorState::Opening);
            guard.open_button = 1;
            guard.notify_all();
        }
        {
            let guard = viewer.lock();
            assert_eq!(guard.door_state(), Some(DoorState::Opening));
            assert_eq!(guard.open_button, 1);
        }
    }

    #[test]
    fn attach_missing_region_reports_no_such_car() {
        let err = SharedRegion::attach(&unique_name("missing")).unwrap_err();
        assert!(matches!(err, RegionError::NoSuchCar { .. }));
    }

    #[test]
    fn owner_drop_unlinks_object() {
        let name = unique_name("unlink");
        let path = format!("/dev/shm{REGION_PREFIX}{name}");
        {
            let _owner = SharedRegion::create(&name, floor(1)).unwrap();
            assert!(std::path::Path::new(&path).exists());
        }
        assert!(!std::path::Path::new(&path).exists());
        assert!(SharedRegion::attach(&name).is_err());
    }

    #[test]
    fn attacher_drop_keeps_object() {
        let name = unique_name("keep");
        let owner = SharedRegion::create(&name, floor(1)).unwrap();
        {
            let _viewer = SharedRegion::attach(&name).unwrap();
        }
        assert!(SharedRegion::attach(&name).is_ok());
        drop(owner);
    }

    #[test]
    fn wait_timeout_expires() {
        let name = unique_name("timeout");
        let region = SharedRegion::create(&name, floor(1)).unwrap();
        let mut guard = region.lock();
        let start = Instant::now();
        let outcome = guard.wait_timeout(Duration::from_millis(30));
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn broadcast_wakes_waiter_in_other_thread() {
        let name = unique_name("wake");
        let region = std::sync::Arc::new(SharedRegion::create(&name, floor(1)).unwrap());

        let waiter = {
            let region = std::sync::Arc::clone(&region);
            std::thread::spawn(move || {
                let mut guard = region.lock();
                while guard.open_button == 0 {
                    if guard.wait_timeout(Duration::from_secs(5)) == WaitOutcome::TimedOut {
                        return false;
                    }
                }
                true
            })
        };

        // Give the waiter time to block before signalling.
        std::thread::sleep(Duration::from_millis(50));
        {
            let mut guard = region.lock();
            guard.open_button = 1;
            guard.notify_all();
        }
        assert!(waiter.join().unwrap(), "waiter timed out instead of waking");
    }
}
