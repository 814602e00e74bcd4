//! Wall-clock time primitive.
//!
//! Used for ledger bookkeeping (created/attempted timestamps), retention
//! windows, debounce cooldowns, and retry due-times. Ordering of server data
//! never depends on it — that comes from server cursors.

use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
///
/// Copy is fine here - it's just a measurement, not causality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallClock(pub u64);

impl WallClock {
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(ms)
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn since(self, earlier: WallClock) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for WallClock {
    type Output = WallClock;

    fn add(self, rhs: Duration) -> WallClock {
        WallClock(self.0.saturating_add(rhs.as_millis() as u64))
    }
}
