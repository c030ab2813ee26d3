//! Car registry: the fixed table of live cars and the dispatch step.
//!
//! All mutation happens under one process-wide mutex owned by the server;
//! the registry itself is plain data plus the socket writes the dispatch
//! step performs. Entries are keyed by connection id so a worker whose slot
//! was adopted by a newer connection of the same name cannot free or update
//! the adopter's entry.

use std::io::Write;
use std::net::TcpStream;

use tracing::{debug, warn};

use lift_common::consts::{CAR_NAME_MAX, MAX_CARS};
use lift_common::region::{FLOOR_LEN, STATUS_LEN};
use lift_common::status::DoorState;
use lift_common::{frame, Floor, Message, SharedRegion};

use crate::queue::StopQueue;

/// One live car.
#[derive(Debug)]
pub struct CarEntry {
    /// Identity of the connection that owns this slot.
    pub conn_id: u64,
    /// Display name, truncated to [`CAR_NAME_MAX`].
    pub name: String,
    /// Lowest serviced floor.
    pub lo: Floor,
    /// Highest serviced floor.
    pub hi: Floor,
    /// Last reported status token.
    pub status: String,
    /// Last reported current floor token.
    pub cur: String,
    /// Last reported destination floor token.
    pub dst: String,
    /// Ordered stops.
    pub queue: StopQueue,
    /// Write half of the car connection.
    pub stream: TcpStream,
    /// Mirror handle to the car's shared region, when the attach succeeded.
    pub region: Option<SharedRegion>,
}

impl CarEntry {
    fn covers(&self, src: Floor, dst: Floor) -> bool {
        src.in_range(self.lo, self.hi) && dst.in_range(self.lo, self.hi)
    }

    /// Send `FLOOR <head>` if the queue is non-empty. Write errors are left
    /// for the serve loop's next read to surface.
    fn send_head(&mut self) {
        if let Some(head) = self.queue.head() {
            let msg = Message::Floor {
                floor: head.to_string(),
            };
            let mut writer = &self.stream;
            if frame::send_frame(&mut writer, &msg.to_string()).is_err() {
                debug!(car = %self.name, "dropped FLOOR frame on dead connection");
            }
            let _ = writer.flush();
        }
    }
}

/// Outcome of a registration attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Entry created or adopted at this slot index.
    Slot(usize),
    /// Table full; the connection must be dropped.
    Full,
}

/// Fixed-size table of car slots.
pub struct Registry {
    slots: Vec<Option<CarEntry>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_CARS).map(|_| None).collect(),
        }
    }

    /// Register a car. An in-use entry with the same name is adopted: the
    /// previous connection loses the slot and the queue restarts empty.
    /// Otherwise the first free slot is taken.
    pub fn register(
        &mut self,
        conn_id: u64,
        stream: TcpStream,
        name: &str,
        lo: Floor,
        hi: Floor,
    ) -> RegisterOutcome {
        let mut name = name.to_string();
        name.truncate(CAR_NAME_MAX);

        let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };

        let adopted = self
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.name == name));
        let index = match adopted.or_else(|| self.slots.iter().position(Option::is_none)) {
            Some(i) => i,
            None => return RegisterOutcome::Full,
        };
        if adopted.is_some() {
            warn!(car = %name, slot = index, "existing registration adopted by new connection");
        }

        let lo_str = lo.to_string();
        self.slots[index] = Some(CarEntry {
            conn_id,
            name,
            lo,
            hi,
            status: DoorState::Closed.as_str().to_string(),
            cur: lo_str.clone(),
            dst: lo_str,
            queue: StopQueue::new(),
            stream,
            region: None,
        });
        RegisterOutcome::Slot(index)
    }

    /// Open the car's shared region and seed the mirror fields under its
    /// lock. A failure leaves the slot live without the mirror.
    pub fn attach_region(&mut self, index: usize) {
        let Some(entry) = self.slots.get_mut(index).and_then(Option::as_mut) else {
            return;
        };
        match SharedRegion::attach(&entry.name) {
            Ok(region) => {
                {
                    let mut guard = region.lock();
                    guard.set_status_raw(&entry.status);
                    guard.set_current_raw(&entry.cur);
                    guard.set_destination_raw(&entry.dst);
                    guard.notify_all();
                }
                entry.region = Some(region);
            }
            Err(e) => {
                warn!(car = %entry.name, error = %e, "region attach failed; serving without mirror");
            }
        }
    }

    /// Free the slot owned by `conn_id`, detaching the region mirror.
    /// A stale id (slot since adopted) is a no-op.
    pub fn remove_by_conn(&mut self, conn_id: u64) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|e| e.conn_id == conn_id) {
                *slot = None;
                return;
            }
        }
    }

    /// Mirror a STATUS report into the slot and, when attached, into the
    /// shared region. Tokens are truncated to the region field widths.
    pub fn update_status(&mut self, conn_id: u64, status: &str, cur: &str, dst: &str) {
        let Some(entry) = self.entry_by_conn(conn_id) else {
            return;
        };
        entry.status = truncated(status, STATUS_LEN - 1);
        entry.cur = truncated(cur, FLOOR_LEN - 1);
        entry.dst = truncated(dst, FLOOR_LEN - 1);
        if let Some(region) = &entry.region {
            let mut guard = region.lock();
            guard.set_status_raw(&entry.status);
            guard.set_current_raw(&entry.cur);
            guard.set_destination_raw(&entry.dst);
            guard.notify_all();
        }
    }

    /// The dispatch step, run after every STATUS: pop the head when the car
    /// reports `Opening` at it, then (re)send the head if one remains.
    pub fn dispatch_step(&mut self, conn_id: u64) {
        let Some(entry) = self.entry_by_conn(conn_id) else {
            return;
        };
        if let Some(head) = entry.queue.head() {
            if entry.status == DoorState::Opening.as_str() && entry.cur == head.to_string() {
                entry.queue.pop_head();
            }
        }
        entry.send_head();
    }

    /// First in-use car, in slot order, whose service range covers both
    /// floors.
    pub fn select(&self, src: Floor, dst: Floor) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.covers(src, dst)))
    }

    /// Fold a call into the selected car's queue and push the head frame.
    pub fn enqueue_call(&mut self, index: usize, src: Floor, dst: Floor) {
        if let Some(entry) = self.slots.get_mut(index).and_then(Option::as_mut) {
            entry.queue.enqueue(src, dst);
            entry.send_head();
        }
    }

    /// Entry at `index`, if in use.
    pub fn get(&self, index: usize) -> Option<&CarEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn entry_by_conn(&mut self, conn_id: u64) -> Option<&mut CarEntry> {
        self.slots
            .iter_mut()
            .filter_map(Option::as_mut)
            .find(|e| e.conn_id == conn_id)
    }
}

fn truncated(token: &str, max: usize) -> String {
    let mut s = token.to_string();
    s.truncate(max);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn floor(level: i16) -> Floor {
        Floor::new(level).unwrap()
    }

    /// A connected stream pair over loopback; the far end lets tests read
    /// what the registry writes.
    fn stream_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    fn recv(stream: &mut TcpStream) -> String {
        frame::recv_frame(stream, 64).unwrap()
    }

    #[test]
    fn register_fills_slots_in_order() {
        let mut reg = Registry::new();
        let (a, _ka) = stream_pair();
        let (b, _kb) = stream_pair();
        assert_eq!(
            reg.register(1, a, "Alpha", floor(1), floor(10)),
            RegisterOutcome::Slot(0)
        );
        assert_eq!(
            reg.register(2, b, "Beta", floor(1), floor(5)),
            RegisterOutcome::Slot(1)
        );
        assert_eq!(reg.get(0).unwrap().name, "Alpha");
        assert_eq!(reg.get(1).unwrap().name, "Beta");
    }

    #[test]
    fn inverted_range_is_swapped() {
        let mut reg = Registry::new();
        let (a, _k) = stream_pair();
        reg.register(1, a, "Alpha", floor(10), floor(2));
        let entry = reg.get(0).unwrap();
        assert_eq!(entry.lo, floor(2));
        assert_eq!(entry.hi, floor(10));
        assert_eq!(entry.cur, "2");
    }

    #[test]
    fn same_name_adopts_the_slot() {
        let mut reg = Registry::new();
        let (a, _ka) = stream_pair();
        let (b, _kb) = stream_pair();
        reg.register(1, a, "Alpha", floor(1), floor(5));
        reg.enqueue_call(0, floor(2), floor(4));
        assert_eq!(
            reg.register(2, b, "Alpha", floor(1), floor(10)),
            RegisterOutcome::Slot(0)
        );
        let entry = reg.get(0).unwrap();
        assert_eq!(entry.conn_id, 2);
        assert_eq!(entry.hi, floor(10));
        assert!(entry.queue.is_empty());
    }

    #[test]
    fn stale_conn_cannot_remove_adopted_slot() {
        let mut reg = Registry::new();
        let (a, _ka) = stream_pair();
        let (b, _kb) = stream_pair();
        reg.register(1, a, "Alpha", floor(1), floor(5));
        reg.register(2, b, "Alpha", floor(1), floor(5));
        reg.remove_by_conn(1);
        assert!(reg.get(0).is_some(), "adopted slot must survive the old worker");
        reg.remove_by_conn(2);
        assert!(reg.get(0).is_none());
    }

    #[test]
    fn table_full_rejects() {
        let mut reg = Registry::new();
        let mut keep = Vec::new();
        for i in 0..MAX_CARS {
            let (s, k) = stream_pair();
            keep.push(k);
            assert_eq!(
                reg.register(i as u64, s, &format!("Car{i}"), floor(1), floor(5)),
                RegisterOutcome::Slot(i)
            );
        }
        let (s, _k) = stream_pair();
        assert_eq!(
            reg.register(99, s, "Overflow", floor(1), floor(5)),
            RegisterOutcome::Full
        );
    }

    #[test]
    fn selection_is_first_match_in_slot_order() {
        let mut reg = Registry::new();
        let (a, _ka) = stream_pair();
        let (b, _kb) = stream_pair();
        let (c, _kc) = stream_pair();
        reg.register(1, a, "Alpha", floor(1), floor(5));
        reg.register(2, b, "Beta", floor(1), floor(10));
        reg.register(3, c, "Gamma", floor(3), floor(9));
        let index = reg.select(floor(8), floor(9)).unwrap();
        assert_eq!(reg.get(index).unwrap().name, "Beta");
        assert!(reg.select(floor(20), floor(21)).is_none());
    }

    #[test]
    fn dispatch_pops_on_opening_at_head_and_resends() {
        let mut reg = Registry::new();
        let (server, mut client) = stream_pair();
        reg.register(1, server, "Alpha", floor(1), floor(10));
        reg.enqueue_call(0, floor(3), floor(7));
        assert_eq!(recv(&mut client), "FLOOR 3");

        // Not yet at the head: head stays, frame repeats.
        reg.update_status(1, "Between", "2", "3");
        reg.dispatch_step(1);
        assert_eq!(recv(&mut client), "FLOOR 3");
        assert_eq!(reg.get(0).unwrap().queue.len(), 2);

        // Opening at the head pops it and pushes the next stop.
        reg.update_status(1, "Opening", "3", "3");
        reg.dispatch_step(1);
        assert_eq!(recv(&mut client), "FLOOR 7");
        assert_eq!(reg.get(0).unwrap().queue.len(), 1);

        reg.update_status(1, "Opening", "7", "7");
        reg.dispatch_step(1);
        assert!(reg.get(0).unwrap().queue.is_empty());
    }

    #[test]
    fn status_tokens_are_truncated_to_field_widths() {
        let mut reg = Registry::new();
        let (server, _client) = stream_pair();
        reg.register(1, server, "Alpha", floor(1), floor(10));
        reg.update_status(1, "Absurdly-long-status", "12345", "678");
        let entry = reg.get(0).unwrap();
        assert_eq!(entry.status.len(), STATUS_LEN - 1);
        assert_eq!(entry.cur, "123");
        assert_eq!(entry.dst, "678");
    }
}
