//! Typed view of the ASCII frames exchanged between the processes.
//!
//! Classification and token splitting happen here; semantic checks on floor
//! and status tokens stay with the handlers, which decide per frame whether
//! a bad token is a protocol violation or something to ignore.

use std::fmt;

use thiserror::Error;

/// Error for frames that match no known shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized frame: {frame:?}")]
pub struct ProtocolError {
    /// The offending frame payload.
    pub frame: String,
}

/// One wire message, either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `CAR <name> <lo> <hi>` — car registration, first frame of a car
    /// connection.
    Register {
        /// Display name of the car.
        name: String,
        /// Lowest serviced floor, raw token.
        lo: String,
        /// Highest serviced floor, raw token.
        hi: String,
    },
    /// `STATUS <status> <cur> <dst>` — car state report.
    Status {
        /// Door/motion status token.
        status: String,
        /// Current floor token.
        cur: String,
        /// Destination floor token.
        dst: String,
    },
    /// `INDIVIDUAL SERVICE` — car entering technician mode.
    IndividualService,
    /// `EMERGENCY` — car entering emergency mode.
    Emergency,
    /// `FLOOR <f>` — controller directing a car to a floor.
    Floor {
        /// Target floor token.
        floor: String,
    },
    /// `CALL <src> <dst>` — caller requesting a pickup.
    Call {
        /// Source floor token.
        src: String,
        /// Destination floor token.
        dst: String,
    },
    /// `CAR <name>` — controller naming the dispatched car to the caller.
    Assigned {
        /// Name of the dispatched car.
        name: String,
    },
    /// `UNAVAILABLE` — no car can take the request.
    Unavailable,
}

impl Message {
    /// Parse a frame payload. Tokens are split on ASCII whitespace; a frame
    /// with an unknown keyword or the wrong token count fails.
    pub fn parse(payload: &str) -> Result<Message, ProtocolError> {
        let tokens: Vec<&str> = payload.split_ascii_whitespace().collect();
        let message = match tokens.as_slice() {
            ["CAR", name, lo, hi] => Message::Register {
                name: (*name).to_string(),
                lo: (*lo).to_string(),
                hi: (*hi).to_string(),
            },
            ["CAR", name] => Message::Assigned {
                name: (*name).to_string(),
            },
            ["STATUS", status, cur, dst] => Message::Status {
                status: (*status).to_string(),
                cur: (*cur).to_string(),
                dst: (*dst).to_string(),
            },
            ["INDIVIDUAL", "SERVICE"] => Message::IndividualService,
            ["EMERGENCY"] => Message::Emergency,
            ["FLOOR", floor] => Message::Floor {
                floor: (*floor).to_string(),
            },
            ["CALL", src, dst] => Message::Call {
                src: (*src).to_string(),
                dst: (*dst).to_string(),
            },
            ["UNAVAILABLE"] => Message::Unavailable,
            _ => {
                return Err(ProtocolError {
                    frame: payload.to_string(),
                })
            }
        };
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Register { name, lo, hi } => write!(f, "CAR {name} {lo} {hi}"),
            Message::Status { status, cur, dst } => write!(f, "STATUS {status} {cur} {dst}"),
            Message::IndividualService => f.write_str("INDIVIDUAL SERVICE"),
            Message::Emergency => f.write_str("EMERGENCY"),
            Message::Floor { floor } => write!(f, "FLOOR {floor}"),
            Message::Call { src, dst } => write!(f, "CALL {src} {dst}"),
            Message::Assigned { name } => write!(f, "CAR {name}"),
            Message::Unavailable => f.write_str("UNAVAILABLE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_register_and_assigned_by_arity() {
        assert_eq!(
            Message::parse("CAR Alpha 1 10").unwrap(),
            Message::Register {
                name: "Alpha".into(),
                lo: "1".into(),
                hi: "10".into(),
            }
        );
        assert_eq!(
            Message::parse("CAR Alpha").unwrap(),
            Message::Assigned {
                name: "Alpha".into()
            }
        );
        assert!(Message::parse("CAR Alpha 1").is_err());
        assert!(Message::parse("CAR").is_err());
    }

    #[test]
    fn parse_remaining_shapes() {
        assert_eq!(
            Message::parse("STATUS Closed 1 1").unwrap(),
            Message::Status {
                status: "Closed".into(),
                cur: "1".into(),
                dst: "1".into(),
            }
        );
        assert_eq!(
            Message::parse("INDIVIDUAL SERVICE").unwrap(),
            Message::IndividualService
        );
        assert_eq!(Message::parse("EMERGENCY").unwrap(), Message::Emergency);
        assert_eq!(
            Message::parse("FLOOR B2").unwrap(),
            Message::Floor { floor: "B2".into() }
        );
        assert_eq!(
            Message::parse("CALL 3 7").unwrap(),
            Message::Call {
                src: "3".into(),
                dst: "7".into(),
            }
        );
        assert_eq!(Message::parse("UNAVAILABLE").unwrap(), Message::Unavailable);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        for bad in ["", "HELLO", "STATUS Closed 1", "FLOOR", "CALL 3", "EMERGENCY now"] {
            assert!(Message::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn encode_parse_roundtrip() {
        let messages = [
            Message::Register {
                name: "Beta".into(),
                lo: "B2".into(),
                hi: "20".into(),
            },
            Message::Status {
                status: "Between".into(),
                cur: "4".into(),
                dst: "9".into(),
            },
            Message::IndividualService,
            Message::Emergency,
            Message::Floor { floor: "7".into() },
            Message::Call {
                src: "5".into(),
                dst: "2".into(),
            },
            Message::Assigned {
                name: "Gamma".into(),
            },
            Message::Unavailable,
        ];
        for m in messages {
            assert_eq!(Message::parse(&m.to_string()).unwrap(), m);
        }
    }
}
