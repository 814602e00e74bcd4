//! Injectable time source.
//!
//! Backoff due-times, debounce cooldowns, and retention windows all read the
//! clock through this trait so tests advance time explicitly instead of
//! sleeping.

use std::sync::Mutex;
use std::time::Duration;

use crate::core::WallClock;

pub trait Clock: Send + Sync {
    fn now(&self) -> WallClock;
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> WallClock {
        WallClock::now()
    }
}

/// Hand-advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<WallClock>,
}

impl ManualClock {
    pub fn new(start: WallClock) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now = *now + by;
    }

    pub fn set(&self, to: WallClock) {
        *self.now.lock().expect("clock lock") = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> WallClock {
        *self.now.lock().expect("clock lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(WallClock(1_000));
        assert_eq!(clock.now(), WallClock(1_000));
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), WallClock(1_250));
    }
}
