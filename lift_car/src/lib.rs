//! Elevator car library.
//!
//! The `car` binary wires [`context::CarContext`] to the [`engine`] main
//! loop and the [`link`] network worker; keeping them here lets tests drive
//! the state machine against a real region without a controller.

pub mod context;
pub mod engine;
pub mod link;
pub mod notify;

pub use context::{CarConfig, CarContext};
pub use engine::Engine;
