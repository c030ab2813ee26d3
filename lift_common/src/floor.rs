//! Floor identifier and its ASCII codec.
//!
//! A floor is a signed integer in [−99, −1] ∪ [1, 999]; there is no floor
//! zero. The wire/region form is a plain decimal for above-ground floors
//! (`"5"`) and a `B`-prefixed decimal of the magnitude for basements
//! (`"B2"`). Parsing accepts a lowercase `b`; formatting always emits the
//! canonical uppercase form. Over canonical strings the codec is an exact
//! bijection.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Deepest basement level.
pub const MIN_FLOOR: i16 = -99;
/// Highest above-ground level.
pub const MAX_FLOOR: i16 = 999;

/// Error type for floor-string parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseFloorError {
    /// Empty input.
    #[error("empty floor string")]
    Empty,
    /// Non-digit characters, a leading zero, or a bare `B`.
    #[error("malformed floor string")]
    Malformed,
    /// Parsed fine but outside [−99, −1] ∪ [1, 999].
    #[error("floor out of range")]
    OutOfRange,
}

/// A validated floor identifier.
///
/// Construction goes through [`Floor::new`] or [`FromStr`], so a held value
/// is always inside the legal domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Floor(i16);

impl Floor {
    /// Wrap a raw level, rejecting zero and out-of-domain values.
    pub const fn new(level: i16) -> Option<Self> {
        if level == 0 || level < MIN_FLOOR || level > MAX_FLOOR {
            None
        } else {
            Some(Self(level))
        }
    }

    /// Raw signed level.
    #[inline]
    pub const fn level(self) -> i16 {
        self.0
    }

    /// Whether `self` lies inside the inclusive service range `[lo, hi]`.
    #[inline]
    pub const fn in_range(self, lo: Floor, hi: Floor) -> bool {
        lo.0 <= self.0 && self.0 <= hi.0
    }

    /// Clamp into the inclusive service range `[lo, hi]`.
    pub fn clamp_to(self, lo: Floor, hi: Floor) -> Floor {
        if self.0 < lo.0 {
            lo
        } else if self.0 > hi.0 {
            hi
        } else {
            self
        }
    }

    /// One floor toward `dest`, skipping the nonexistent floor zero.
    ///
    /// At the destination this is the identity.
    pub fn step_toward(self, dest: Floor) -> Floor {
        if self.0 < dest.0 {
            let next = if self.0 + 1 == 0 { 1 } else { self.0 + 1 };
            Floor(next)
        } else if self.0 > dest.0 {
            let next = if self.0 - 1 == 0 { -1 } else { self.0 - 1 };
            Floor(next)
        } else {
            self
        }
    }

    /// The floor directly above, skipping zero. `None` above the domain.
    pub const fn step_up(self) -> Option<Floor> {
        let next = if self.0 + 1 == 0 { 1 } else { self.0 + 1 };
        Floor::new(next)
    }

    /// The floor directly below, skipping zero. `None` below the domain.
    pub const fn step_down(self) -> Option<Floor> {
        let next = if self.0 - 1 == 0 { -1 } else { self.0 - 1 };
        Floor::new(next)
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "B{}", -self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for Floor {
    type Err = ParseFloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseFloorError::Empty);
        }
        let (basement, digits) = match s.strip_prefix(['B', 'b']) {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseFloorError::Malformed);
        }
        let magnitude: i16 = digits.parse().map_err(|_| ParseFloorError::OutOfRange)?;
        let limit = if basement { -MIN_FLOOR } else { MAX_FLOOR };
        if magnitude < 1 || magnitude > limit {
            return Err(ParseFloorError::OutOfRange);
        }
        Ok(Floor(if basement { -magnitude } else { magnitude }))
    }
}
