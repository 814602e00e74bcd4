//! Retry/rollback policy.
//!
//! The single place retry semantics live. Feature code never writes its own
//! retry loop; it asks this table what to do with a classified failure.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::classify::ErrorCategory;
use crate::config::RetryConfig;
use crate::core::PendingUpdate;

/// Corrective action the feature layer should take beyond the mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerHint {
    /// Local state is stale; refetch authoritative state.
    Refetch,
    /// Session is no longer valid; trigger re-authentication.
    Reauthenticate,
}

/// What to do with a failed attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-issue the remote call after the delay.
    Retry { delay: Duration },
    /// Revert the optimistic change. Terminal.
    Rollback { hint: Option<CallerHint> },
    /// Leave optimistic state at the decision point and surface the raw
    /// message; the caller decides whether to revert the form. Terminal.
    Surface,
}

pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Decide the next step for `update` after a failure of `category`.
    ///
    /// `update.retry_count` counts attempts already consumed; the first
    /// failure arrives with a count of zero.
    pub fn decide(&self, update: &PendingUpdate, category: ErrorCategory) -> RetryDecision {
        match category {
            ErrorCategory::Network | ErrorCategory::ServerError => {
                if update.retry_count < self.config.max_attempts {
                    RetryDecision::Retry {
                        delay: self.backoff(update.retry_count),
                    }
                } else {
                    RetryDecision::Rollback { hint: None }
                }
            }
            ErrorCategory::Conflict => RetryDecision::Rollback {
                hint: Some(CallerHint::Refetch),
            },
            ErrorCategory::Authorization => RetryDecision::Rollback {
                hint: Some(CallerHint::Reauthenticate),
            },
            ErrorCategory::Validation => RetryDecision::Surface,
            ErrorCategory::Unknown => {
                if update.retry_count < self.config.unknown_max_attempts {
                    RetryDecision::Retry {
                        delay: self.backoff(update.retry_count),
                    }
                } else {
                    RetryDecision::Rollback { hint: None }
                }
            }
        }
    }

    /// Exponential backoff: base * factor^attempt, capped, with optional
    /// ±10% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.config.backoff_factor).max(1);
        let scaled = factor
            .checked_pow(attempt)
            .and_then(|exp| self.config.backoff_base_ms.checked_mul(exp))
            .unwrap_or(self.config.backoff_max_ms);
        let capped = scaled.min(self.config.backoff_max_ms);
        let ms = if self.config.jitter {
            let spread = rand::rng().random_range(0.9..=1.1);
            (capped as f64 * spread) as u64
        } else {
            capped
        };
        Duration::from_millis(ms)
    }
}
