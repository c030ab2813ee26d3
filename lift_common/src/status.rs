//! Door/motion status of a car.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The five legal door/motion states.
///
/// The ASCII form is what crosses the wire and sits in the shared region;
/// everything else in the system works on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorState {
    /// Doors closed, car stationary.
    Closed,
    /// Doors in motion toward open.
    Opening,
    /// Doors fully open.
    Open,
    /// Doors in motion toward closed.
    Closing,
    /// Car moving between floors, doors closed.
    Between,
}

/// All states, in a fixed order.
pub const ALL_STATES: [DoorState; 5] = [
    DoorState::Closed,
    DoorState::Opening,
    DoorState::Open,
    DoorState::Closing,
    DoorState::Between,
];

/// Error for non-status strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown door status: {token:?}")]
pub struct ParseDoorStateError {
    /// The offending token.
    pub token: String,
}

impl DoorState {
    /// Canonical ASCII form (≤7 bytes).
    pub const fn as_str(self) -> &'static str {
        match self {
            DoorState::Closed => "Closed",
            DoorState::Opening => "Opening",
            DoorState::Open => "Open",
            DoorState::Closing => "Closing",
            DoorState::Between => "Between",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DoorState {
    type Err = ParseDoorStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Closed" => Ok(DoorState::Closed),
            "Opening" => Ok(DoorState::Opening),
            "Open" => Ok(DoorState::Open),
            "Closing" => Ok(DoorState::Closing),
            "Between" => Ok(DoorState::Between),
            other => Err(ParseDoorStateError {
                token: other.to_string(),
            }),
        }
    }
}
