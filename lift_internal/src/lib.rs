//! Maintenance tool library.
//!
//! The `internal` binary attaches to a car region, applies one [`ops::Op`],
//! broadcasts, and exits; the operation semantics live here for testing.

pub mod ops;

pub use ops::{apply, Op, OpError, ParseOpError};
