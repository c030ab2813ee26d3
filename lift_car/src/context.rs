//! Shared state of one car process.
//!
//! The context is passed explicitly to the engine and the network link so
//! both can be exercised against a synthetic region in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use lift_common::region::RegionError;
use lift_common::{shutdown, Floor, SharedRegion};

use crate::notify::StatusSignal;

/// Validated startup parameters.
#[derive(Debug, Clone)]
pub struct CarConfig {
    /// Display name; also names the shared region object.
    pub name: String,
    /// Lowest serviced floor.
    pub lo: Floor,
    /// Highest serviced floor.
    pub hi: Floor,
    /// Timing parameter for every door and travel phase.
    pub delay: Duration,
    /// Controller TCP port.
    pub port: u16,
}

/// Everything the engine and link threads share.
pub struct CarContext {
    /// Startup parameters.
    pub cfg: CarConfig,
    /// The owned shared region.
    pub region: SharedRegion,
    /// Destination parked while the car is mid-step. Accessed only while
    /// holding the region lock (region lock first, then this one).
    pub pending: Mutex<Option<Floor>>,
    /// Status-change edge toward the transmit thread.
    pub tx_signal: StatusSignal,
    stop: AtomicBool,
}

impl CarContext {
    /// Create the region (parked at `cfg.lo`) and wrap it with the shared
    /// process state.
    pub fn new(cfg: CarConfig) -> Result<Self, RegionError> {
        let region = SharedRegion::create(&cfg.name, cfg.lo)?;
        Ok(Self {
            cfg,
            region,
            pending: Mutex::new(None),
            tx_signal: StatusSignal::new(),
            stop: AtomicBool::new(false),
        })
    }

    /// Ask the engine and link loops to wind down (tests; SIGINT uses the
    /// process-wide flag instead).
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.region.lock().notify_all();
        self.tx_signal.raise();
    }

    /// Whether any stop condition holds.
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst) || shutdown::requested()
    }
}
