//! TCP server: accept loop, peer classification, and the two serve paths.
//!
//! Every accepted connection gets a detached worker thread. The first frame
//! decides whether the peer is a car (long-lived serve loop) or a caller
//! (single request/reply). Per-connection failures never propagate past the
//! worker.

use std::io;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use socket2::{Domain, Socket, Type};
use tracing::{debug, error, info};

use lift_common::consts::{CONTROLLER_RX_CAPACITY, LISTEN_BACKLOG};
use lift_common::{frame, shutdown, Floor, Message};

use crate::registry::{RegisterOutcome, Registry};

/// The dispatcher: listener plus the registry behind its process-wide lock.
pub struct Controller {
    listener: TcpListener,
    registry: Mutex<Registry>,
    next_conn_id: AtomicU64,
}

impl Controller {
    /// Bind the listener on `0.0.0.0:<port>` with `SO_REUSEADDR`. Port 0
    /// picks an ephemeral port (tests).
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        Ok(Self {
            listener: socket.into(),
            registry: Mutex::new(Registry::new()),
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Actual listening address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop; returns on shutdown or an unrecoverable accept error.
    pub fn run(self: &Arc<Self>) {
        info!(addr = %self.local_addr().map(|a| a.to_string()).unwrap_or_default(), "controller listening");
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
                    debug!(%peer, conn_id, "connection accepted");
                    let controller = Arc::clone(self);
                    thread::spawn(move || controller.handle_connection(stream, conn_id));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    if shutdown::requested() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "accept failed; stopping listener");
                    break;
                }
            }
        }
    }

    /// Classify the peer off its first frame and hand it to the right path.
    fn handle_connection(&self, mut stream: TcpStream, conn_id: u64) {
        let Ok(payload) = frame::recv_frame(&mut stream, CONTROLLER_RX_CAPACITY) else {
            return;
        };
        match Message::parse(&payload) {
            Ok(Message::Register { name, lo, hi }) => {
                self.serve_registration(stream, conn_id, &name, &lo, &hi)
            }
            Ok(Message::Call { src, dst }) => self.handle_call(stream, &src, &dst),
            _ => {
                debug!(conn_id, frame = %payload, "unknown first frame; dropping connection");
            }
        }
    }

    fn serve_registration(
        &self,
        stream: TcpStream,
        conn_id: u64,
        name: &str,
        lo: &str,
        hi: &str,
    ) {
        let (Ok(lo), Ok(hi)) = (lo.parse::<Floor>(), hi.parse::<Floor>()) else {
            debug!(conn_id, name, "registration with unparsable floors; dropping");
            return;
        };
        let Ok(writer) = stream.try_clone() else {
            return;
        };

        {
            let mut registry = self.registry.lock().unwrap();
            match registry.register(conn_id, writer, name, lo, hi) {
                RegisterOutcome::Slot(index) => {
                    info!(car = name, slot = index, conn_id, "car registered");
                    // Registry lock first, region lock inside; never the
                    // other way around.
                    registry.attach_region(index);
                }
                RegisterOutcome::Full => {
                    info!(car = name, conn_id, "registry full; dropping car");
                    return;
                }
            }
        }

        self.serve_car(stream, conn_id);
    }

    /// Per-car serve loop: mirror STATUS reports and run the dispatch step
    /// until the connection dies or violates the protocol.
    fn serve_car(&self, mut stream: TcpStream, conn_id: u64) {
        loop {
            let Ok(payload) = frame::recv_frame(&mut stream, CONTROLLER_RX_CAPACITY) else {
                break;
            };
            match Message::parse(&payload) {
                Ok(Message::Status { status, cur, dst }) => {
                    let mut registry = self.registry.lock().unwrap();
                    registry.update_status(conn_id, &status, &cur, &dst);
                    registry.dispatch_step(conn_id);
                }
                Ok(Message::IndividualService) | Ok(Message::Emergency) => continue,
                _ => {
                    debug!(conn_id, frame = %payload, "protocol violation; dropping car");
                    break;
                }
            }
        }
        self.registry.lock().unwrap().remove_by_conn(conn_id);
        debug!(conn_id, "car connection closed");
    }

    /// One call: pick a car, reply, queue the trip.
    fn handle_call(&self, stream: TcpStream, src: &str, dst: &str) {
        let reply = |msg: Message| {
            let mut writer = &stream;
            let _ = frame::send_frame(&mut writer, &msg.to_string());
            let _ = stream.shutdown(Shutdown::Write);
        };

        let (Ok(src), Ok(dst)) = (src.parse::<Floor>(), dst.parse::<Floor>()) else {
            reply(Message::Unavailable);
            return;
        };
        if src == dst {
            reply(Message::Unavailable);
            return;
        }

        let mut registry = self.registry.lock().unwrap();
        match registry.select(src, dst) {
            Some(index) => {
                let name = registry
                    .get(index)
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                info!(car = %name, %src, %dst, "call dispatched");
                reply(Message::Assigned { name });
                registry.enqueue_call(index, src, dst);
            }
            None => {
                info!(%src, %dst, "no car covers the requested trip");
                reply(Message::Unavailable);
            }
        }
    }
}
