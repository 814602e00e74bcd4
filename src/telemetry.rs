//! Structured coordinator events and tracing setup.

use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::classify::ErrorCategory;
use crate::core::{EntityRef, UpdateId};

/// Everything the coordinator reports about a mutation's life.
///
/// Format and destination are the embedder's concern; the coordinator only
/// guarantees these are emitted exactly once per transition.
#[derive(Clone, Debug, PartialEq)]
pub enum CoordinatorEvent {
    MutationApplied {
        update_id: UpdateId,
        entity: EntityRef,
    },
    MutationConfirmed {
        update_id: UpdateId,
        entity: EntityRef,
        /// Server value differed from the optimistic one.
        overridden: bool,
    },
    MutationRolledBack {
        update_id: UpdateId,
        entity: EntityRef,
        category: ErrorCategory,
    },
    RetryScheduled {
        update_id: UpdateId,
        entity: EntityRef,
        attempt: u32,
        delay_ms: u64,
    },
    DuplicateSuppressed {
        entity: EntityRef,
    },
    StalePageDropped {
        feature: String,
        offset: usize,
    },
}

impl CoordinatorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CoordinatorEvent::MutationApplied { .. } => "mutation_applied",
            CoordinatorEvent::MutationConfirmed { .. } => "mutation_confirmed",
            CoordinatorEvent::MutationRolledBack { .. } => "mutation_rolled_back",
            CoordinatorEvent::RetryScheduled { .. } => "retry_scheduled",
            CoordinatorEvent::DuplicateSuppressed { .. } => "duplicate_suppressed",
            CoordinatorEvent::StalePageDropped { .. } => "stale_page_dropped",
        }
    }
}

/// Injected metrics destination.
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: &CoordinatorEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&self, _event: &CoordinatorEvent) {}
}

/// Buffers events in memory; test fixtures assert on the buffer.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CoordinatorEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<CoordinatorEvent> {
        self.events.lock().expect("sink lock").clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name()).collect()
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, event: &CoordinatorEvent) {
        self.events.lock().expect("sink lock").push(event.clone());
    }
}

/// Emit to tracing and forward to the sink.
pub(crate) fn emit(sink: &Arc<dyn MetricsSink>, event: CoordinatorEvent) {
    match &event {
        CoordinatorEvent::MutationApplied { update_id, entity } => {
            tracing::debug!(%update_id, %entity, "mutation_applied");
        }
        CoordinatorEvent::MutationConfirmed {
            update_id,
            entity,
            overridden,
        } => {
            tracing::debug!(%update_id, %entity, overridden, "mutation_confirmed");
        }
        CoordinatorEvent::MutationRolledBack {
            update_id,
            entity,
            category,
        } => {
            tracing::info!(%update_id, %entity, category = category.as_str(), "mutation_rolled_back");
        }
        CoordinatorEvent::RetryScheduled {
            update_id,
            entity,
            attempt,
            delay_ms,
        } => {
            tracing::debug!(%update_id, %entity, attempt, delay_ms, "retry_scheduled");
        }
        CoordinatorEvent::DuplicateSuppressed { entity } => {
            tracing::debug!(%entity, "duplicate_suppressed");
        }
        CoordinatorEvent::StalePageDropped { feature, offset } => {
            tracing::info!(feature = feature.as_str(), offset, "stale_page_dropped");
        }
    }
    sink.record(&event);
}

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub verbosity: u8,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { verbosity: 0 }
    }
}

/// Install a global tracing subscriber.
///
/// The `LOG` env var overrides the verbosity-derived default, same filter
/// syntax as any `EnvFilter`. Call once per process; embedders with their own
/// subscriber skip this entirely.
pub fn init(config: TelemetryConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(config.verbosity).into())
        .with_env_var("LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish()
        .init();
}

fn level_from_verbosity(verbosity: u8) -> tracing::level_filters::LevelFilter {
    use tracing::level_filters::LevelFilter;
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityId, EntityKind, FieldSet};

    #[test]
    fn memory_sink_collects_in_order() {
        let sink = MemorySink::default();
        let entity = EntityRef::new(
            EntityKind::Notification,
            EntityId::parse("n-1").unwrap(),
            FieldSet::All,
        );
        sink.record(&CoordinatorEvent::DuplicateSuppressed {
            entity: entity.clone(),
        });
        sink.record(&CoordinatorEvent::StalePageDropped {
            feature: "feed".into(),
            offset: 20,
        });
        assert_eq!(sink.names(), vec!["duplicate_suppressed", "stale_page_dropped"]);
    }
}
