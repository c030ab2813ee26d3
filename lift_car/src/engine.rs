//! Door/motion engine.
//!
//! One pass of the engine services whatever woke it: a pending trip, a
//! cabin button, or a mode flag. Normal passes run the full door cycle and
//! single-floor travel steps; service and emergency passes restrict motion
//! and latch the doors. Every status edge broadcasts the region condvar
//! (for the safety monitor and the tools) and raises the transmit signal
//! (for the controller link).

use std::thread;
use std::time::Duration;

use lift_common::region::deadline_after;
use lift_common::{DoorState, WaitOutcome};

use crate::context::CarContext;

/// Idle poll window while nothing needs servicing.
const IDLE_WAIT: Duration = Duration::from_millis(200);
/// Settle window between service/emergency passes.
const MODE_WAIT: Duration = Duration::from_millis(100);
/// Settle window after a normal pass.
const PASS_WAIT: Duration = Duration::from_millis(50);

/// The per-car state machine driver.
pub struct Engine<'a> {
    ctx: &'a CarContext,
}

impl<'a> Engine<'a> {
    pub fn new(ctx: &'a CarContext) -> Self {
        Self { ctx }
    }

    /// Run passes until shutdown.
    pub fn run(&self) {
        while !self.ctx.should_stop() {
            self.step();
        }
    }

    /// One engine pass: wait for work, then service it.
    pub fn step(&self) {
        {
            let mut guard = self.ctx.region.lock();
            while !self.ctx.should_stop()
                && guard.open_button == 0
                && guard.close_button == 0
                && guard.individual_service_mode == 0
                && guard.emergency_mode == 0
                && guard.at_destination()
            {
                guard.wait_timeout(IDLE_WAIT);
            }
        }
        if self.ctx.should_stop() {
            return;
        }

        if self.flag(|g: &lift_common::RegionFields| g.individual_service_mode) {
            self.service_pass();
        } else if self.flag(|g| g.emergency_mode) {
            self.emergency_pass();
        } else {
            self.normal_pass();
        }
    }

    // ─── Normal operation ───────────────────────────────────────────

    fn normal_pass(&self) {
        if self.at_destination() {
            self.open_cycle();
            self.promote_pending();
        } else {
            match self.door_state() {
                Some(DoorState::Closed) => {
                    self.travel_step();
                    if self.at_destination() {
                        self.open_cycle();
                    }
                    self.promote_pending();
                }
                Some(DoorState::Closing) => {
                    // Caught mid-close: finish before anything else.
                    self.set_and_dwell(DoorState::Closing);
                    self.force_closed();
                }
                Some(DoorState::Opening) => {
                    // Caught mid-open: complete the open cycle.
                    self.open_cycle();
                }
                _ => {}
            }
        }

        let (open, close) = self.take_buttons();
        if open
            && matches!(
                self.door_state(),
                Some(DoorState::Closed) | Some(DoorState::Closing)
            )
        {
            self.open_cycle();
        }
        if close && self.door_state() == Some(DoorState::Open) {
            self.set_and_dwell(DoorState::Closing);
            self.force_closed();
        }

        let mut guard = self.ctx.region.lock();
        guard.wait_timeout(PASS_WAIT);
    }

    /// Full door cycle: `Opening` → dwell → `Open` → open window →
    /// `Closing` → dwell → `Closed`.
    fn open_cycle(&self) {
        if self.set_and_dwell(DoorState::Opening) != Some(DoorState::Opening) {
            // The dwell was overtaken (emergency or a forced state change);
            // let the next pass sort it out.
            return;
        }

        {
            let mut guard = self.ctx.region.lock();
            guard.set_door_state(DoorState::Open);
            guard.notify_all();
        }
        self.ctx.tx_signal.raise();

        self.open_window();

        thread::sleep(self.ctx.cfg.delay);
        {
            let mut guard = self.ctx.region.lock();
            if guard.door_state() == Some(DoorState::Closing) {
                guard.set_door_state(DoorState::Closed);
                guard.notify_all();
            }
        }
        self.ctx.tx_signal.raise();
    }

    /// Hold the doors open for one delay window. An open-button press
    /// restarts the window; a close-button press or the timeout ends it.
    /// Leaves the car in `Closing`.
    fn open_window(&self) {
        let mut guard = self.ctx.region.lock();
        let mut deadline = deadline_after(self.ctx.cfg.delay);
        while guard.close_button == 0 {
            if guard.open_button == 1 {
                guard.open_button = 0;
                deadline = deadline_after(self.ctx.cfg.delay);
                continue;
            }
            if guard.wait_until(&deadline) == WaitOutcome::TimedOut {
                break;
            }
        }
        if guard.close_button == 1 {
            guard.close_button = 0;
        }
        guard.set_door_state(DoorState::Closing);
        guard.notify_all();
        drop(guard);
        self.ctx.tx_signal.raise();
    }

    /// One travel step: `Between` → dwell → advance one floor toward the
    /// destination (skipping zero, clamped to the service range) → `Closed`.
    fn travel_step(&self) {
        self.set_and_dwell(DoorState::Between);
        {
            let mut guard = self.ctx.region.lock();
            if guard.door_state() == Some(DoorState::Between) {
                if let (Some(cur), Some(dst)) = (guard.current(), guard.destination()) {
                    let next = cur
                        .step_toward(dst)
                        .clamp_to(self.ctx.cfg.lo, self.ctx.cfg.hi);
                    guard.set_current(next);
                }
                guard.set_door_state(DoorState::Closed);
                guard.notify_all();
            }
        }
        self.ctx.tx_signal.raise();
    }

    /// Promote a destination parked during `Between` once the step has
    /// settled.
    fn promote_pending(&self) {
        {
            let mut guard = self.ctx.region.lock();
            let mut pending = self.ctx.pending.lock().unwrap();
            if let Some(floor) = pending.take() {
                guard.set_destination(floor);
                guard.notify_all();
            }
        }
        self.ctx.tx_signal.raise();
    }

    // ─── Service mode ───────────────────────────────────────────────

    fn service_pass(&self) {
        self.service_motion();

        let (open, close) = self.take_buttons();
        if open
            && matches!(
                self.door_state(),
                Some(DoorState::Closed) | Some(DoorState::Closing)
            )
        {
            // Latched open: no window, no auto-close.
            if self.set_and_dwell(DoorState::Opening) == Some(DoorState::Opening) {
                let mut guard = self.ctx.region.lock();
                guard.set_door_state(DoorState::Open);
                guard.notify_all();
                drop(guard);
                self.ctx.tx_signal.raise();
            }
        }
        if close && self.door_state() == Some(DoorState::Open) {
            self.set_and_dwell(DoorState::Closing);
            self.force_closed();
        }

        let mut guard = self.ctx.region.lock();
        guard.wait_timeout(MODE_WAIT);
    }

    /// Technician motion: honored only one floor at a time; anything else
    /// snaps the destination back to the current floor.
    fn service_motion(&self) {
        if self.door_state() != Some(DoorState::Closed) {
            return;
        }
        let (cur, dst) = {
            let guard = self.ctx.region.lock();
            (guard.current(), guard.destination())
        };
        let (Some(cur), Some(dst)) = (cur, dst) else {
            return;
        };
        if (dst.level() - cur.level()).abs() != 1 {
            let mut guard = self.ctx.region.lock();
            guard.set_destination(cur);
            guard.notify_all();
            return;
        }
        self.travel_step();
    }

    // ─── Emergency mode ─────────────────────────────────────────────

    fn emergency_pass(&self) {
        let (open, close) = self.take_buttons();
        if open
            && matches!(
                self.door_state(),
                Some(DoorState::Closed) | Some(DoorState::Closing)
            )
        {
            if self.set_and_dwell(DoorState::Opening) == Some(DoorState::Opening) {
                let mut guard = self.ctx.region.lock();
                guard.set_door_state(DoorState::Open);
                guard.notify_all();
                drop(guard);
                self.ctx.tx_signal.raise();
            }
        }
        if close {
            match self.door_state() {
                Some(DoorState::Open) => {
                    if self.set_and_dwell(DoorState::Closing) == Some(DoorState::Closing) {
                        self.force_closed();
                    }
                }
                Some(DoorState::Closing) => self.force_closed(),
                _ => {}
            }
        }

        let mut guard = self.ctx.region.lock();
        guard.wait_timeout(MODE_WAIT);
    }

    // ─── Shared helpers ─────────────────────────────────────────────

    /// Write a status, broadcast, dwell one delay, and report the status
    /// seen afterwards (the safety monitor may have overridden it).
    fn set_and_dwell(&self, state: DoorState) -> Option<DoorState> {
        {
            let mut guard = self.ctx.region.lock();
            guard.set_door_state(state);
            guard.notify_all();
        }
        self.ctx.tx_signal.raise();

        thread::sleep(self.ctx.cfg.delay);

        let after = self.ctx.region.lock().door_state();
        self.ctx.tx_signal.raise();
        after
    }

    fn force_closed(&self) {
        {
            let mut guard = self.ctx.region.lock();
            guard.set_door_state(DoorState::Closed);
            guard.notify_all();
        }
        self.ctx.tx_signal.raise();
    }

    /// Sample and clear both cabin buttons.
    fn take_buttons(&self) -> (bool, bool) {
        let mut guard = self.ctx.region.lock();
        let open = guard.open_button == 1;
        let close = guard.close_button == 1;
        guard.open_button = 0;
        guard.close_button = 0;
        (open, close)
    }

    fn door_state(&self) -> Option<DoorState> {
        self.ctx.region.lock().door_state()
    }

    fn at_destination(&self) -> bool {
        self.ctx.region.lock().at_destination()
    }

    fn flag(&self, read: impl Fn(&lift_common::RegionFields) -> u8) -> bool {
        read(&self.ctx.region.lock()) != 0
    }
}
