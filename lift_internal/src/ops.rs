//! Maintenance operations on a car's shared region.

use std::str::FromStr;

use thiserror::Error;

use lift_common::region::RegionGuard;
use lift_common::DoorState;

/// One maintenance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Press the door-open button.
    Open,
    /// Press the door-close button.
    Close,
    /// Press the emergency stop.
    Stop,
    /// Enter technician mode (clears emergency mode).
    ServiceOn,
    /// Leave technician mode.
    ServiceOff,
    /// Move one floor up (technician mode, doors closed).
    Up,
    /// Move one floor down (technician mode, doors closed).
    Down,
}

/// Error for unknown operation tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid operation.")]
pub struct ParseOpError;

impl FromStr for Op {
    type Err = ParseOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Op::Open),
            "close" => Ok(Op::Close),
            "stop" => Ok(Op::Stop),
            "service_on" => Ok(Op::ServiceOn),
            "service_off" => Ok(Op::ServiceOff),
            "up" => Ok(Op::Up),
            "down" => Ok(Op::Down),
            _ => Err(ParseOpError),
        }
    }
}

/// Why an operation was refused. The display strings are the operator
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OpError {
    /// `up`/`down` outside technician mode.
    #[error("Operation only allowed in service mode.")]
    NotInServiceMode,
    /// `up`/`down` while the car is between floors.
    #[error("Operation not allowed while elevator is moving.")]
    Moving,
    /// `up`/`down` while the doors are not closed.
    #[error("Operation not allowed while doors are open.")]
    DoorsOpen,
}

/// Apply one operation under the region lock. The caller broadcasts the
/// condvar after a successful apply.
pub fn apply(op: Op, guard: &mut RegionGuard<'_>) -> Result<(), OpError> {
    match op {
        Op::Open => guard.open_button = 1,
        Op::Close => guard.close_button = 1,
        Op::Stop => guard.emergency_stop = 1,
        Op::ServiceOn => {
            guard.individual_service_mode = 1;
            guard.emergency_mode = 0;
        }
        Op::ServiceOff => guard.individual_service_mode = 0,
        Op::Up | Op::Down => {
            if guard.individual_service_mode == 0 {
                return Err(OpError::NotInServiceMode);
            }
            match guard.door_state() {
                Some(DoorState::Between) => return Err(OpError::Moving),
                Some(DoorState::Closed) => {}
                _ => return Err(OpError::DoorsOpen),
            }
            if let Some(cur) = guard.current() {
                let next = if op == Op::Up {
                    cur.step_up()
                } else {
                    cur.step_down()
                };
                // Off the end of the floor domain there is nothing to aim
                // at; leave the destination alone.
                if let Some(next) = next {
                    guard.set_destination(next);
                }
            }
        }
    }
    Ok(())
}
