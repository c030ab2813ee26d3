//! Wake handling and consistency validation.
//!
//! The monitor blocks on the region condvar; every wake runs
//! [`handle_wake`] under the lock. The pure [`validate`] core checks the
//! region image without touching it, so it is testable on a plain snapshot.

use lift_common::region::RegionGuard;
use lift_common::{DoorState, RegionFields};

/// Operator-visible alarm raised by a wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm {
    /// The emergency stop button was pressed.
    EmergencyStop,
    /// The overload sensor tripped.
    Overload,
    /// The region image violates a consistency rule.
    DataConsistency,
}

impl Alarm {
    /// The operator message for this alarm.
    pub fn message(self) -> &'static str {
        match self {
            Alarm::EmergencyStop => "The emergency stop button has been pressed!",
            Alarm::Overload => "The overload sensor has been tripped!",
            Alarm::DataConsistency => "Data consistency error!",
        }
    }
}

/// First consistency rule an image violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
    /// Status is not one of the five legal values.
    BadStatus,
    /// A floor field does not parse.
    BadFloor,
    /// A flag byte holds something other than 0 or 1.
    BadFlag,
    /// Obstruction asserted while the doors are not moving.
    ObstructionWhileParked,
}

/// Check the consistency rules on a field snapshot.
pub fn validate(fields: &RegionFields) -> Result<(), Inconsistency> {
    let status = fields.door_state().ok_or(Inconsistency::BadStatus)?;
    if fields.current().is_none() || fields.destination().is_none() {
        return Err(Inconsistency::BadFloor);
    }
    let flags = [
        fields.open_button,
        fields.close_button,
        fields.door_obstruction,
        fields.overload,
        fields.emergency_stop,
        fields.individual_service_mode,
        fields.emergency_mode,
    ];
    if flags.iter().any(|&f| f > 1) {
        return Err(Inconsistency::BadFlag);
    }
    if fields.door_obstruction == 1
        && !matches!(status, DoorState::Opening | DoorState::Closing)
    {
        return Err(Inconsistency::ObstructionWhileParked);
    }
    Ok(())
}

/// One monitor wake, run with the region lock held. Returns the alarm to
/// report after the lock is released, if any.
pub fn handle_wake(guard: &mut RegionGuard<'_>) -> Option<Alarm> {
    // Heartbeat first: a live monitor always leaves 1 behind.
    if guard.safety_system != 1 {
        guard.safety_system = 1;
        guard.notify_all();
    }

    // An obstructed closing door reverses.
    if guard.door_state() == Some(DoorState::Closing) && guard.door_obstruction == 1 {
        guard.set_door_state(DoorState::Opening);
        guard.notify_all();
    }

    if guard.emergency_stop == 1 && guard.emergency_mode == 0 {
        guard.emergency_mode = 1;
        guard.emergency_stop = 0;
        guard.notify_all();
        return Some(Alarm::EmergencyStop);
    }

    if guard.overload == 1 && guard.emergency_mode == 0 {
        guard.emergency_mode = 1;
        guard.notify_all();
        return Some(Alarm::Overload);
    }

    if guard.emergency_mode == 0 && validate(guard).is_err() {
        guard.emergency_mode = 1;
        guard.notify_all();
        return Some(Alarm::DataConsistency);
    }

    None
}
