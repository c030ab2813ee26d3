//! Status-change signal between the engine and the transmit thread.
//!
//! The engine raises the signal on every status edge; the transmit thread
//! consumes it, or times out after the car delay and treats the silence as
//! a safety heartbeat tick.

use std::sync::{Condvar, Mutex};
use std::time::Instant;

/// Edge-triggered flag with a condvar, the in-process analogue of the
/// region's wait/notify.
#[derive(Debug, Default)]
pub struct StatusSignal {
    flag: Mutex<bool>,
    cv: Condvar,
}

impl StatusSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a status change and wake the transmit thread.
    pub fn raise(&self) {
        let mut flag = self.flag.lock().unwrap();
        *flag = true;
        self.cv.notify_one();
    }

    /// Consume the signal, waiting until `deadline` for it. Returns whether
    /// the signal was raised; either way the flag is clear afterwards.
    pub fn take_or_wait_until(&self, deadline: Instant) -> bool {
        let mut flag = self.flag.lock().unwrap();
        loop {
            if *flag {
                *flag = false;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _timeout) = self.cv.wait_timeout(flag, deadline - now).unwrap();
            flag = guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn raised_signal_is_consumed_once() {
        let signal = StatusSignal::new();
        signal.raise();
        let deadline = Instant::now() + Duration::from_millis(10);
        assert!(signal.take_or_wait_until(deadline));
        // Second take sees a clear flag and times out.
        let deadline = Instant::now() + Duration::from_millis(10);
        assert!(!signal.take_or_wait_until(deadline));
    }

    #[test]
    fn waiting_take_is_woken_by_raise() {
        let signal = Arc::new(StatusSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || {
                signal.take_or_wait_until(Instant::now() + Duration::from_secs(5))
            })
        };
        std::thread::sleep(Duration::from_millis(30));
        signal.raise();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn timeout_without_raise() {
        let signal = StatusSignal::new();
        let start = Instant::now();
        assert!(!signal.take_or_wait_until(start + Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
