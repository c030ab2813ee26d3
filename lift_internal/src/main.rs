//! `internal` — one-shot maintenance operation on a car.

use std::process::ExitCode;

use clap::Parser;

use lift_common::SharedRegion;
use lift_internal::ops::{self, Op};

/// Maintenance tool for a car's shared region.
#[derive(Parser, Debug)]
#[command(name = "internal")]
#[command(about = "Applies one maintenance operation to a car's shared region")]
struct Args {
    /// Name of the target car.
    car_name: String,

    /// Operation: open, close, stop, service_on, service_off, up, down.
    operation: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    lift_common::init_tracing();

    let Ok(op) = args.operation.parse::<Op>() else {
        eprintln!("Invalid operation.");
        return ExitCode::FAILURE;
    };

    let region = match SharedRegion::attach(&args.car_name) {
        Ok(region) => region,
        Err(e) => {
            eprintln!("Unable to access car {}.", args.car_name);
            tracing::debug!(error = %e, "region attach failed");
            return ExitCode::FAILURE;
        }
    };

    let mut guard = region.lock();
    match ops::apply(op, &mut guard) {
        Ok(()) => {
            guard.notify_all();
            ExitCode::SUCCESS
        }
        Err(e) => {
            drop(guard);
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
