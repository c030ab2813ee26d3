//! Fixed `#[repr(C)]` layout of a car's shared region.
//!
//! The layout is the ABI between the car, the safety monitor, and the
//! maintenance tool; field order, widths, and offsets must never change
//! without bumping all three binaries together. String fields hold
//! NUL-terminated ASCII; flags are single bytes holding 0 or 1.

use static_assertions::const_assert_eq;

use crate::floor::Floor;
use crate::status::DoorState;

use super::sync::RegionSync;

/// Width of the status field: ≤7 ASCII chars + NUL.
pub const STATUS_LEN: usize = 8;
/// Width of a floor field: ≤3 ASCII chars + NUL.
pub const FLOOR_LEN: usize = 4;

/// The data block of the region. Every read or write happens under the
/// region lock.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RegionFields {
    /// Door/motion status string.
    pub status: [u8; STATUS_LEN],
    /// Current floor string.
    pub current_floor: [u8; FLOOR_LEN],
    /// Destination floor string.
    pub destination_floor: [u8; FLOOR_LEN],
    /// Door-open request from the cabin panel.
    pub open_button: u8,
    /// Door-close request from the cabin panel.
    pub close_button: u8,
    /// Light curtain broken while the doors move.
    pub door_obstruction: u8,
    /// Load sensor over limit.
    pub overload: u8,
    /// Emergency stop pressed; consumed by the safety monitor.
    pub emergency_stop: u8,
    /// Technician mode.
    pub individual_service_mode: u8,
    /// Emergency mode; sticky until serviced.
    pub emergency_mode: u8,
    /// Safety heartbeat counter: the monitor writes 1 on every wake, the car
    /// increments on transmit timeout, ≥3 means the monitor is gone.
    pub safety_system: u8,
}

const_assert_eq!(core::mem::size_of::<RegionFields>(), 24);

/// Full region image: sync block first, then the data block.
#[repr(C)]
pub struct RegionLayout {
    /// Cross-process lock and wait/notify.
    pub sync: RegionSync,
    /// The guarded fields.
    pub fields: RegionFields,
}

/// Copy `s` into a NUL-terminated fixed field, truncating to `dst.len() − 1`
/// bytes.
pub fn write_cstr(dst: &mut [u8], s: &str) {
    dst.fill(0);
    let take = s.len().min(dst.len() - 1);
    dst[..take].copy_from_slice(&s.as_bytes()[..take]);
}

/// Read a NUL-terminated fixed field. Non-UTF-8 content reads as empty,
/// which downstream parsers reject.
pub fn read_cstr(buf: &[u8]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end]).unwrap_or("")
}

impl RegionFields {
    /// Startup image: doors closed, parked at `initial`, everything clear.
    pub fn starting_at(initial: Floor) -> Self {
        let mut fields = RegionFields {
            status: [0; STATUS_LEN],
            current_floor: [0; FLOOR_LEN],
            destination_floor: [0; FLOOR_LEN],
            open_button: 0,
            close_button: 0,
            door_obstruction: 0,
            overload: 0,
            emergency_stop: 0,
            individual_service_mode: 0,
            emergency_mode: 0,
            safety_system: 0,
        };
        fields.set_door_state(DoorState::Closed);
        fields.set_current(initial);
        fields.set_destination(initial);
        fields
    }

    /// Status field as a string slice.
    pub fn status_str(&self) -> &str {
        read_cstr(&self.status)
    }

    /// Status field as a [`DoorState`], if it holds a legal value.
    pub fn door_state(&self) -> Option<DoorState> {
        self.status_str().parse().ok()
    }

    /// Write a legal status value.
    pub fn set_door_state(&mut self, state: DoorState) {
        write_cstr(&mut self.status, state.as_str());
    }

    /// Write a raw status token (controller mirror path; tokens arrive
    /// unvalidated off the wire).
    pub fn set_status_raw(&mut self, token: &str) {
        write_cstr(&mut self.status, token);
    }

    /// Current floor field as a string slice.
    pub fn current_str(&self) -> &str {
        read_cstr(&self.current_floor)
    }

    /// Current floor, if the field parses.
    pub fn current(&self) -> Option<Floor> {
        self.current_str().parse().ok()
    }

    /// Write the current floor.
    pub fn set_current(&mut self, floor: Floor) {
        write_cstr(&mut self.current_floor, &floor.to_string());
    }

    /// Write a raw current-floor token (controller mirror path).
    pub fn set_current_raw(&mut self, token: &str) {
        write_cstr(&mut self.current_floor, token);
    }

    /// Destination floor field as a string slice.
    pub fn destination_str(&self) -> &str {
        read_cstr(&self.destination_floor)
    }

    /// Destination floor, if the field parses.
    pub fn destination(&self) -> Option<Floor> {
        self.destination_str().parse().ok()
    }

    /// Write the destination floor.
    pub fn set_destination(&mut self, floor: Floor) {
        write_cstr(&mut self.destination_floor, &floor.to_string());
    }

    /// Write a raw destination-floor token (controller mirror path).
    pub fn set_destination_raw(&mut self, token: &str) {
        write_cstr(&mut self.destination_floor, token);
    }

    /// Whether the current and destination fields hold the same string.
    pub fn at_destination(&self) -> bool {
        self.current_floor == self.destination_floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn field_block_is_packed_at_fixed_offsets() {
        assert_eq!(offset_of!(RegionFields, status), 0);
        assert_eq!(offset_of!(RegionFields, current_floor), 8);
        assert_eq!(offset_of!(RegionFields, destination_floor), 12);
        assert_eq!(offset_of!(RegionFields, open_button), 16);
        assert_eq!(offset_of!(RegionFields, close_button), 17);
        assert_eq!(offset_of!(RegionFields, door_obstruction), 18);
        assert_eq!(offset_of!(RegionFields, overload), 19);
        assert_eq!(offset_of!(RegionFields, emergency_stop), 20);
        assert_eq!(offset_of!(RegionFields, individual_service_mode), 21);
        assert_eq!(offset_of!(RegionFields, emergency_mode), 22);
        assert_eq!(offset_of!(RegionFields, safety_system), 23);
    }

    #[test]
    fn fields_follow_sync_block() {
        assert_eq!(
            offset_of!(RegionLayout, fields),
            core::mem::size_of::<RegionSync>()
        );
    }

    #[test]
    fn starting_image_defaults() {
        let lo = Floor::new(-2).unwrap();
        let fields = RegionFields::starting_at(lo);
        assert_eq!(fields.status_str(), "Closed");
        assert_eq!(fields.current_str(), "B2");
        assert_eq!(fields.destination_str(), "B2");
        assert!(fields.at_destination());
        assert_eq!(fields.open_button, 0);
        assert_eq!(fields.safety_system, 0);
    }

    #[test]
    fn cstr_truncation_keeps_terminator() {
        let mut buf = [0u8; 4];
        write_cstr(&mut buf, "1000");
        assert_eq!(&buf, b"100\0");
        assert_eq!(read_cstr(&buf), "100");

        write_cstr(&mut buf, "7");
        assert_eq!(read_cstr(&buf), "7");
        assert_eq!(buf[1], 0);
    }

    #[test]
    fn typed_accessors_roundtrip() {
        let mut fields = RegionFields::starting_at(Floor::new(1).unwrap());
        fields.set_door_state(DoorState::Between);
        assert_eq!(fields.door_state(), Some(DoorState::Between));

        let f = Floor::new(-15).unwrap();
        fields.set_destination(f);
        assert_eq!(fields.destination(), Some(f));
        assert!(!fields.at_destination());

        fields.set_status_raw("garbage!");
        assert_eq!(fields.door_state(), None);
        assert_eq!(fields.status_str(), "garbage");
    }
}
