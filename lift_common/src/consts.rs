//! System-wide constants.

/// Default controller TCP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Controller address for outbound connections.
pub const CONTROLLER_HOST: &str = "127.0.0.1";

/// Registry capacity: live cars the controller tracks at once.
pub const MAX_CARS: usize = 16;

/// Stop-queue capacity per car; appends beyond this are dropped silently.
pub const MAX_QUEUE: usize = 32;

/// Longest car display name kept in the registry.
pub const CAR_NAME_MAX: usize = 31;

/// Kernel object name prefix: a car named `Alpha` owns `/carAlpha`.
pub const REGION_PREFIX: &str = "/car";

/// Listener backlog on the controller socket.
pub const LISTEN_BACKLOG: i32 = 16;

/// Receive buffer capacity on controller connections.
pub const CONTROLLER_RX_CAPACITY: usize = 256;

/// Receive buffer capacity on the car's controller link.
pub const CAR_RX_CAPACITY: usize = 64;

/// Receive buffer capacity on the caller's connection.
pub const CALL_RX_CAPACITY: usize = 64;
