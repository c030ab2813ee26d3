//! Length-prefixed frame codec.
//!
//! Every transport message is a 2-byte big-endian payload length followed by
//! exactly that many ASCII bytes. The codec is agnostic to payload content.
//!
//! Receiving takes a capacity: a payload that does not fit is truncated to
//! `capacity − 1` bytes and the remainder is drained off the stream in
//! fixed-size chunks, so the next frame starts aligned. Short reads and
//! writes are retried by `read_exact`/`write_all` (which also retry on
//! EINTR); a clean end-of-stream fails the call with `UnexpectedEof`.

use std::io::{self, Read, Write};

/// Largest payload a frame header can describe. Longer payloads are clamped
/// on send.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Chunk size used to drain oversize payloads.
const DRAIN_CHUNK: usize = 512;

/// Send one frame.
pub fn send_frame<W: Write>(w: &mut W, payload: &str) -> io::Result<()> {
    let bytes = payload.as_bytes();
    let len = bytes.len().min(MAX_PAYLOAD);
    w.write_all(&(len as u16).to_be_bytes())?;
    w.write_all(&bytes[..len])
}

/// Receive one frame into an owned string, truncating to `capacity − 1`
/// bytes if the payload is larger than the receive buffer.
pub fn recv_frame<R: Read>(r: &mut R, capacity: usize) -> io::Result<String> {
    debug_assert!(capacity > 0);

    let mut header = [0u8; 2];
    r.read_exact(&mut header)?;
    let len = u16::from_be_bytes(header) as usize;

    let keep = if len < capacity { len } else { capacity - 1 };
    let mut payload = vec![0u8; keep];
    r.read_exact(&mut payload)?;

    let mut remainder = len - keep;
    let mut scratch = [0u8; DRAIN_CHUNK];
    while remainder > 0 {
        let chunk = remainder.min(DRAIN_CHUNK);
        r.read_exact(&mut scratch[..chunk])?;
        remainder -= chunk;
    }

    String::from_utf8(payload)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame payload is not ASCII"))
}
