//! `car` — one elevator process.

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use lift_common::consts::DEFAULT_PORT;
use lift_common::{shutdown, Floor};
use lift_car::{CarConfig, CarContext, Engine};

/// One simulated elevator car.
#[derive(Parser, Debug)]
#[command(name = "car")]
#[command(about = "Runs a car: shared region owner, door/motion engine, controller link")]
struct Args {
    /// Car name; also names the shared region object.
    name: String,

    /// Lowest serviced floor (e.g. `B2` or `1`).
    lowest_floor: Floor,

    /// Highest serviced floor.
    highest_floor: Floor,

    /// Delay for every door and travel phase, in milliseconds.
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    delay_ms: u64,

    /// Controller TCP port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> ExitCode {
    let args = Args::parse();
    lift_common::init_tracing();

    if args.lowest_floor > args.highest_floor {
        eprintln!("Invalid floor range.");
        return ExitCode::FAILURE;
    }

    let cfg = CarConfig {
        name: args.name,
        lo: args.lowest_floor,
        hi: args.highest_floor,
        delay: Duration::from_millis(args.delay_ms),
        port: args.port,
    };

    let ctx = match CarContext::new(cfg) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!(error = %e, "failed to create shared region");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = shutdown::install(Some(ctx.region.cond_ptr())) {
        error!(error = %e, "failed to install signal handlers");
        return ExitCode::FAILURE;
    }

    {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || lift_car::link::run(ctx));
    }

    info!(car = %ctx.cfg.name, lo = %ctx.cfg.lo, hi = %ctx.cfg.hi, "car running");
    Engine::new(&ctx).run();

    // The link thread may be blocked on I/O; unlink the region explicitly
    // rather than waiting for the last Arc to drop.
    ctx.region.unlink();
    info!("car shut down");
    ExitCode::SUCCESS
}
