//! `controller` — fleet dispatcher entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use lift_common::consts::DEFAULT_PORT;
use lift_common::shutdown;
use lift_controller::Controller;

/// Central elevator fleet controller.
#[derive(Parser, Debug)]
#[command(name = "controller")]
#[command(about = "Accepts car registrations and pickup calls, dispatches cars")]
struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> ExitCode {
    let args = Args::parse();
    lift_common::init_tracing();

    if let Err(e) = shutdown::install(None) {
        error!(error = %e, "failed to install signal handlers");
        return ExitCode::FAILURE;
    }

    let controller = match Controller::bind(args.port) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!(port = args.port, error = %e, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    controller.run();
    ExitCode::SUCCESS
}
