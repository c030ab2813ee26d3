//! Safety-critical monitor library.
//!
//! The `safety` binary blocks on a car region's condvar and runs the wake
//! handler in [`monitor`]; the handler and its validation core live here so
//! they can be exercised against a synthetic region.

pub mod monitor;

pub use monitor::{handle_wake, validate, Alarm, Inconsistency};
