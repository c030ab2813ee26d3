//! Per-car stop queue.
//!
//! A duplicate-free ordered list of floors the car will visit; the head
//! drives the `FLOOR` frame. Enqueueing a `(src, dst)` call keeps the pickup
//! ahead of the dropoff: a dropoff already queued ahead of the pickup is
//! moved behind it.

use lift_common::consts::MAX_QUEUE;
use lift_common::Floor;

/// Ordered stop list with silent-drop capacity semantics.
#[derive(Debug, Default, Clone)]
pub struct StopQueue {
    floors: Vec<Floor>,
}

impl StopQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            floors: Vec::with_capacity(MAX_QUEUE),
        }
    }

    /// Next floor to visit.
    pub fn head(&self) -> Option<Floor> {
        self.floors.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.floors.len()
    }

    pub fn contains(&self, floor: Floor) -> bool {
        self.floors.contains(&floor)
    }

    /// Remove the head after the car reports arrival there.
    pub fn pop_head(&mut self) {
        if !self.floors.is_empty() {
            self.floors.remove(0);
        }
    }

    /// Ordered view, head first.
    pub fn as_slice(&self) -> &[Floor] {
        &self.floors
    }

    pub fn clear(&mut self) {
        self.floors.clear();
    }

    /// Append unless full; at capacity the floor is dropped silently.
    fn push(&mut self, floor: Floor) {
        if self.floors.len() < MAX_QUEUE {
            self.floors.push(floor);
        }
    }

    /// Fold one `(src, dst)` call into the queue.
    ///
    /// - Equal floors are a no-op.
    /// - `src` is appended if absent.
    /// - A `dst` occurrence ahead of `src` is removed and re-appended, so
    ///   the pickup always precedes the dropoff.
    pub fn enqueue(&mut self, src: Floor, dst: Floor) {
        if src == dst {
            return;
        }
        if !self.contains(src) {
            self.push(src);
        }

        let src_pos = self.floors.iter().position(|&f| f == src);
        let mut dst_pos = self.floors.iter().position(|&f| f == dst);
        if let (Some(s), Some(d)) = (src_pos, dst_pos) {
            if d < s {
                self.floors.remove(d);
                dst_pos = None;
            }
        }
        if dst_pos.is_none() {
            self.push(dst);
        }
    }
}
