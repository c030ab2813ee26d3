//! `safety` — safety-critical monitor for one car.

use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};

use lift_common::{shutdown, SharedRegion};
use lift_safety::monitor;

/// Safety monitor attached to a car's shared region.
#[derive(Parser, Debug)]
#[command(name = "safety")]
#[command(about = "Watches a car's shared region and forces emergency mode on violations")]
struct Args {
    /// Name of the car to monitor.
    car_name: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    lift_common::init_tracing();

    let region = match SharedRegion::attach(&args.car_name) {
        Ok(region) => region,
        Err(e) => {
            eprintln!("Unable to access car {}.", args.car_name);
            tracing::debug!(error = %e, "region attach failed");
            return ExitCode::FAILURE;
        }
    };

    if shutdown::install(Some(region.cond_ptr())).is_err() {
        eprintln!("Unable to access car {}.", args.car_name);
        return ExitCode::FAILURE;
    }

    info!(car = %args.car_name, "safety monitor attached");

    while !shutdown::requested() {
        let alarm = {
            let mut guard = region.lock();
            guard.wait();
            if shutdown::requested() {
                break;
            }
            monitor::handle_wake(&mut guard)
        };
        // Report outside the lock.
        if let Some(alarm) = alarm {
            warn!("{}", alarm.message());
        }
    }

    info!("safety monitor shut down");
    ExitCode::SUCCESS
}
