//! Fleet controller library.
//!
//! The `controller` binary is a thin wrapper around [`Controller`]; the
//! registry and queue logic live here so they can be exercised directly by
//! tests.

pub mod queue;
pub mod registry;
pub mod server;

pub use queue::StopQueue;
pub use registry::{CarEntry, RegisterOutcome, Registry};
pub use server::Controller;
