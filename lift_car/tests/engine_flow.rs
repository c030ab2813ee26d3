//! Engine behavior against a live shared region: travel, door cycles,
//! pending destinations, and the service/emergency restrictions. Each test
//! owns a region under a unique name and drives it the way the tools and
//! the network link do.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lift_common::{DoorState, Floor, RegionFields};
use lift_car::{CarConfig, CarContext, Engine};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

fn floor(level: i16) -> Floor {
    Floor::new(level).unwrap()
}

struct Harness {
    ctx: Arc<CarContext>,
    engine: Option<JoinHandle<()>>,
}

impl Harness {
    /// Create a car context and start the engine thread.
    fn start(lo: i16, hi: i16, delay_ms: u64) -> Self {
        let name = format!(
            "EngTest{}_{}",
            std::process::id(),
            NEXT_ID.fetch_add(1, Ordering::Relaxed)
        );
        let cfg = CarConfig {
            name,
            lo: floor(lo),
            hi: floor(hi),
            delay: Duration::from_millis(delay_ms),
            port: 0,
        };
        let ctx = Arc::new(CarContext::new(cfg).expect("create region"));
        let engine = {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || Engine::new(&ctx).run())
        };
        Self {
            ctx,
            engine: Some(engine),
        }
    }

    /// Mutate the region the way an attached tool would.
    fn with_region(&self, f: impl FnOnce(&mut RegionFields)) {
        let mut guard = self.ctx.region.lock();
        f(&mut guard);
        guard.notify_all();
    }

    /// Poll the region until `pred` holds.
    fn wait_for(&self, what: &str, pred: impl Fn(&RegionFields) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            {
                let guard = self.ctx.region.lock();
                if pred(&guard) {
                    return;
                }
                if Instant::now() >= deadline {
                    panic!(
                        "timed out waiting for {what}; status={} cur={} dst={}",
                        guard.status_str(),
                        guard.current_str(),
                        guard.destination_str()
                    );
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.ctx.request_stop();
        if let Some(engine) = self.engine.take() {
            let _ = engine.join();
        }
    }
}

#[test]
fn travels_to_destination_and_runs_the_door_cycle() {
    let h = Harness::start(1, 10, 40);
    h.with_region(|r| r.set_destination(floor(3)));

    // The car steps floor by floor and arrives closed at 3.
    h.wait_for("arrival at 3", |r| {
        r.current_str() == "3" && r.destination_str() == "3"
    });
    // Arrival runs the full door cycle before settling closed.
    h.wait_for("doors open at 3", |r| r.door_state() == Some(DoorState::Open));
    h.wait_for("doors closed again", |r| {
        r.door_state() == Some(DoorState::Closed) && r.current_str() == "3"
    });
}

#[test]
fn between_passes_through_every_floor() {
    let h = Harness::start(1, 10, 30);
    h.with_region(|r| r.set_destination(floor(4)));

    // Each intermediate floor becomes visible as a Closed settle point.
    for expect in ["2", "3", "4"] {
        h.wait_for("stepwise progress", |r| r.current_str() == expect);
    }
}

#[test]
fn floor_during_between_is_deferred_until_the_step_settles() {
    let h = Harness::start(1, 10, 30);
    h.with_region(|r| r.set_destination(floor(9)));

    // Catch the car committed to a step; park a new destination the way
    // the receive thread does on a FLOOR frame.
    let deadline = Instant::now() + Duration::from_secs(5);
    let committed_to = loop {
        {
            let guard = h.ctx.region.lock();
            if guard.door_state() == Some(DoorState::Between) {
                let cur = guard.current().expect("current floor parses");
                *h.ctx.pending.lock().unwrap() = Some(floor(1));
                guard.notify_all();
                break cur.step_toward(floor(9));
            }
        }
        assert!(Instant::now() < deadline, "never caught the car mid-step");
        thread::sleep(Duration::from_millis(1));
    };

    // The committed step still completes...
    h.wait_for("committed step completes", move |r| {
        r.current() == Some(committed_to)
    });
    // ...then the parked destination takes over and the car comes back.
    h.wait_for("redirected to 1", |r| {
        r.current_str() == "1" && r.destination_str() == "1"
    });
}

#[test]
fn open_button_triggers_a_full_cycle_that_closes_again() {
    let h = Harness::start(1, 5, 40);
    h.with_region(|r| r.open_button = 1);

    h.wait_for("doors open", |r| r.door_state() == Some(DoorState::Open));
    h.wait_for("doors auto-close", |r| {
        r.door_state() == Some(DoorState::Closed) && r.open_button == 0
    });
}

#[test]
fn close_button_cuts_the_open_window_short() {
    // A long delay makes the open window comfortably observable.
    let h = Harness::start(1, 5, 300);
    h.with_region(|r| r.open_button = 1);
    h.wait_for("doors open", |r| r.door_state() == Some(DoorState::Open));

    let pressed = Instant::now();
    h.with_region(|r| r.close_button = 1);
    h.wait_for("doors leave Open", |r| {
        r.door_state() != Some(DoorState::Open)
    });
    // Well inside the 300 ms window the timeout would have taken.
    assert!(pressed.elapsed() < Duration::from_millis(250));
}

#[test]
fn service_mode_moves_one_floor_and_snaps_back_otherwise() {
    let h = Harness::start(1, 5, 30);
    h.with_region(|r| {
        r.set_current(floor(2));
        r.set_destination(floor(2));
        r.individual_service_mode = 1;
    });

    // One floor up is honored. The write can race a snap-back pass that
    // read the old destination, so reassert it until the car moves.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        {
            let mut guard = h.ctx.region.lock();
            if guard.current_str() == "3" && guard.door_state() == Some(DoorState::Closed) {
                break;
            }
            if guard.destination_str() != "3" {
                guard.set_destination(floor(3));
                guard.notify_all();
            }
        }
        assert!(Instant::now() < deadline, "service step to 3 never happened");
        thread::sleep(Duration::from_millis(5));
    }

    // A two-floor request snaps the destination back.
    h.with_region(|r| r.set_destination(floor(5)));
    h.wait_for("snap back to 3", |r| {
        r.destination_str() == "3" && r.current_str() == "3"
    });
}

#[test]
fn service_mode_latches_the_doors_open() {
    let h = Harness::start(1, 5, 30);
    h.with_region(|r| r.individual_service_mode = 1);

    h.with_region(|r| r.open_button = 1);
    h.wait_for("doors open", |r| r.door_state() == Some(DoorState::Open));

    // No auto-close window in service mode.
    thread::sleep(Duration::from_millis(200));
    {
        let guard = h.ctx.region.lock();
        assert_eq!(guard.door_state(), Some(DoorState::Open));
    }

    h.with_region(|r| r.close_button = 1);
    h.wait_for("doors closed on request", |r| {
        r.door_state() == Some(DoorState::Closed)
    });
}

#[test]
fn emergency_mode_suppresses_motion() {
    let h = Harness::start(1, 5, 30);
    h.with_region(|r| {
        r.emergency_mode = 1;
        r.set_destination(floor(5));
    });

    thread::sleep(Duration::from_millis(300));
    {
        let guard = h.ctx.region.lock();
        assert_eq!(guard.current_str(), "1", "motion must be suppressed");
    }

    // Doors still answer the buttons, latched like service mode.
    h.with_region(|r| r.open_button = 1);
    h.wait_for("doors open in emergency", |r| {
        r.door_state() == Some(DoorState::Open)
    });
    h.with_region(|r| r.close_button = 1);
    h.wait_for("doors closed in emergency", |r| {
        r.door_state() == Some(DoorState::Closed)
    });
}

#[test]
fn travel_clamps_to_the_service_range() {
    let h = Harness::start(1, 3, 30);
    // A destination written past the range (nothing in the normal path does
    // this, but the region is writable by other processes).
    h.with_region(|r| r.set_destination_raw("9"));

    h.wait_for("clamped at the top floor", |r| r.current_str() == "3");
    thread::sleep(Duration::from_millis(200));
    {
        let guard = h.ctx.region.lock();
        assert_eq!(guard.current_str(), "3", "must not step past hi");
    }
}
