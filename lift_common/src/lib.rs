//! Lift Common Library
//!
//! Shared building blocks for the lift workspace crates:
//!
//! - [`floor`] — floor identifier and its ASCII codec
//! - [`status`] — the five-state door/motion status
//! - [`frame`] — length-prefixed transport framing
//! - [`protocol`] — typed wire messages
//! - [`region`] — per-car shared memory region and its cross-process lock
//! - [`shutdown`] — SIGINT/SIGPIPE wiring
//! - [`consts`] — ports, capacities, object naming

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod consts;
pub mod floor;
pub mod frame;
pub mod protocol;
pub mod region;
pub mod shutdown;
pub mod status;

pub use floor::{Floor, ParseFloorError};
pub use protocol::{Message, ProtocolError};
pub use region::{RegionError, RegionFields, SharedRegion, WaitOutcome};
pub use status::DoorState;

/// Initialize stderr logging for a lift binary.
///
/// Filtering comes from `RUST_LOG`; defaults to `info` when unset so the
/// operator-facing safety messages are always visible.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
