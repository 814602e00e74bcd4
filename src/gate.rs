//! Rate/debounce gate.
//!
//! Stops redundant remote calls for rapidly repeated identical operations
//! (mark-as-read double taps, repeated load-recent). Distinct from the
//! ledger: the gate prevents *issuing* duplicate calls, the ledger prevents
//! *racing* already-issued ones.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::core::WallClock;

/// Per-key cooldown tracker. Pure bookkeeping, no network.
pub struct DebounceGate {
    clock: Arc<dyn Clock>,
    last_pass: HashMap<String, WallClock>,
}

impl DebounceGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_pass: HashMap::new(),
        }
    }

    /// True when no call with this key passed within `cooldown`; records the
    /// pass timestamp on success.
    pub fn should_proceed(&mut self, key: &str, cooldown: Duration) -> bool {
        let now = self.clock.now();
        let cooldown_ms = cooldown.as_millis() as u64;
        if let Some(last) = self.last_pass.get(key)
            && now.since(*last) < cooldown_ms
        {
            return false;
        }
        self.last_pass.insert(key.to_string(), now);
        true
    }

    /// Forget a key so the next call passes immediately (explicit user
    /// refresh overrides the cooldown).
    pub fn reset(&mut self, key: &str) {
        self.last_pass.remove(key);
    }
}
