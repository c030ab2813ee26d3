//! `call` — one-shot pickup request.

use std::net::TcpStream;
use std::process::ExitCode;

use clap::Parser;

use lift_common::consts::{CALL_RX_CAPACITY, CONTROLLER_HOST, DEFAULT_PORT};
use lift_common::{frame, Floor, Message};

/// Request a ride between two floors.
#[derive(Parser, Debug)]
#[command(name = "call")]
#[command(about = "Sends one pickup call to the controller and reports the assigned car")]
struct Args {
    /// Pickup floor (e.g. `B2` or `3`).
    source_floor: String,

    /// Dropoff floor.
    destination_floor: String,

    /// Controller TCP port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (Ok(src), Ok(dst)) = (
        args.source_floor.parse::<Floor>(),
        args.destination_floor.parse::<Floor>(),
    ) else {
        println!("Invalid floor(s) specified.");
        return ExitCode::SUCCESS;
    };
    if src == dst {
        println!("You are already on that floor!");
        return ExitCode::SUCCESS;
    }

    match place_call(args.port, src, dst) {
        Ok(Message::Assigned { name }) => println!("Car {name} is arriving."),
        Ok(_) => println!("Sorry, no car is available to take this request."),
        Err(_) => println!("Unable to connect to elevator system."),
    }
    ExitCode::SUCCESS
}

fn place_call(port: u16, src: Floor, dst: Floor) -> std::io::Result<Message> {
    let mut stream = TcpStream::connect((CONTROLLER_HOST, port))?;
    let call = Message::Call {
        src: src.to_string(),
        dst: dst.to_string(),
    };
    frame::send_frame(&mut stream, &call.to_string())?;
    let reply = frame::recv_frame(&mut stream, CALL_RX_CAPACITY)?;
    Message::parse(&reply)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "bad reply"))
}
