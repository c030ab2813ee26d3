//! Controller link: connect-forever loop with one receive and one transmit
//! thread per connection.
//!
//! The link only holds a connection while the car is in normal mode. The
//! transmit thread forwards status edges, ticks the safety heartbeat
//! counter on silence, and tears the connection down when a mode change or
//! a safety disconnect demands it; the receive thread applies `FLOOR`
//! frames with the pending-destination rule.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use lift_common::consts::{CAR_RX_CAPACITY, CONTROLLER_HOST};
use lift_common::{frame, DoorState, Floor, Message};

use crate::context::CarContext;

/// Safety heartbeat misses that force emergency mode.
const SAFETY_DISCONNECT_LIMIT: u8 = 3;

/// Run the connect-forever loop until shutdown.
pub fn run(ctx: Arc<CarContext>) {
    while !ctx.should_stop() {
        if !wait_until_connectable(&ctx) {
            continue;
        }

        let stream = match TcpStream::connect((CONTROLLER_HOST, ctx.cfg.port)) {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, "controller not reachable; retrying");
                thread::sleep(ctx.cfg.delay);
                continue;
            }
        };
        if register(&ctx, &stream).is_err() {
            thread::sleep(ctx.cfg.delay);
            continue;
        }
        info!(port = ctx.cfg.port, "registered with controller");

        let rx = {
            let ctx = Arc::clone(&ctx);
            let stream = match stream.try_clone() {
                Ok(s) => s,
                Err(_) => continue,
            };
            thread::spawn(move || receive(&ctx, stream))
        };
        let tx = {
            let ctx = Arc::clone(&ctx);
            let stream = match stream.try_clone() {
                Ok(s) => s,
                Err(_) => {
                    let _ = stream.shutdown(Shutdown::Both);
                    let _ = rx.join();
                    continue;
                }
            };
            thread::spawn(move || transmit(&ctx, stream))
        };

        // The transmit thread decides when the connection ends; shutting
        // the socket afterwards unblocks the receiver's read.
        let _ = tx.join();
        let _ = stream.shutdown(Shutdown::Both);
        let _ = rx.join();
        debug!("controller connection closed");
    }
}

/// Poll until neither service nor emergency mode is set. Returns false on
/// shutdown.
fn wait_until_connectable(ctx: &CarContext) -> bool {
    loop {
        if ctx.should_stop() {
            return false;
        }
        let (service, emergency) = {
            let guard = ctx.region.lock();
            (
                guard.individual_service_mode != 0,
                guard.emergency_mode != 0,
            )
        };
        if !service && !emergency {
            return true;
        }
        thread::sleep(ctx.cfg.delay);
    }
}

/// Send the registration frame and the initial status report.
fn register(ctx: &CarContext, mut stream: &TcpStream) -> io::Result<()> {
    let hello = Message::Register {
        name: ctx.cfg.name.clone(),
        lo: ctx.cfg.lo.to_string(),
        hi: ctx.cfg.hi.to_string(),
    };
    frame::send_frame(&mut stream, &hello.to_string())?;
    post_status(ctx, stream)
}

/// Snapshot the region and send one STATUS frame.
fn post_status(ctx: &CarContext, mut stream: &TcpStream) -> io::Result<()> {
    let (status, cur, dst) = {
        let guard = ctx.region.lock();
        (
            guard.status_str().to_string(),
            guard.current_str().to_string(),
            guard.destination_str().to_string(),
        )
    };
    let msg = Message::Status {
        status,
        cur,
        dst,
    };
    frame::send_frame(&mut stream, &msg.to_string())
}

/// Receive loop: apply `FLOOR` frames, park the floor while the car is
/// mid-step. Unknown payloads and junk floor tokens are ignored.
fn receive(ctx: &CarContext, mut stream: TcpStream) {
    loop {
        if ctx.should_stop() {
            return;
        }
        let Ok(payload) = frame::recv_frame(&mut stream, CAR_RX_CAPACITY) else {
            return;
        };
        let Ok(Message::Floor { floor }) = Message::parse(&payload) else {
            continue;
        };
        let Ok(floor) = floor.parse::<Floor>() else {
            debug!(token = %floor, "ignoring FLOOR frame with invalid floor");
            continue;
        };

        let mut guard = ctx.region.lock();
        if guard.door_state() == Some(DoorState::Between) {
            // A committed step must finish before the destination moves.
            *ctx.pending.lock().unwrap() = Some(floor);
            guard.notify_all();
        } else {
            guard.set_destination(floor);
            guard.notify_all();
            drop(guard);
            ctx.tx_signal.raise();
        }
    }
}

/// Transmit loop: status edges out, heartbeat accounting on silence, mode
/// changes terminate the connection.
fn transmit(ctx: &CarContext, stream: TcpStream) {
    loop {
        if ctx.should_stop() {
            return;
        }
        let raised = ctx
            .tx_signal
            .take_or_wait_until(Instant::now() + ctx.cfg.delay);
        if ctx.should_stop() {
            return;
        }

        if raised {
            if post_status(ctx, &stream).is_err() {
                return;
            }
        } else {
            // A full delay of silence: tick the safety counter. The monitor
            // resets it to 1 on every wake, so ≥3 means it is gone.
            let count = {
                let mut guard = ctx.region.lock();
                guard.safety_system = guard.safety_system.saturating_add(1);
                guard.notify_all();
                guard.safety_system
            };
            if count >= SAFETY_DISCONNECT_LIMIT {
                warn!("Safety system disconnected! Entering emergency mode.");
                {
                    let mut guard = ctx.region.lock();
                    guard.emergency_mode = 1;
                    guard.notify_all();
                }
                let _ = frame::send_frame(&mut &stream, &Message::Emergency.to_string());
                return;
            }
        }

        let (service, emergency) = {
            let guard = ctx.region.lock();
            (
                guard.individual_service_mode != 0,
                guard.emergency_mode != 0,
            )
        };
        if service {
            let _ = frame::send_frame(&mut &stream, &Message::IndividualService.to_string());
            return;
        }
        if emergency {
            let _ = frame::send_frame(&mut &stream, &Message::Emergency.to_string());
            return;
        }
    }
}
