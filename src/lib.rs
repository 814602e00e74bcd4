#![forbid(unsafe_code)]

//! Client-side sync core for Ladle: optimistic mutations with ledger
//! tracking, a single retry/rollback policy table, and reconciliation
//! against server responses and real-time pushes.

pub mod classify;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod facade;
pub mod gate;
pub mod ledger;
pub mod policy;
pub mod reconcile;
pub mod runtime;
pub mod telemetry;

pub use error::{DomainCode, Error, RemoteError, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the working set at crate root for convenience
pub use crate::classify::{ClassificationTable, ErrorCategory};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{ConfigError, CoordinatorConfig, DebounceConfig, LedgerConfig, RetryConfig};
pub use crate::core::{
    CollectionItem, EntityId, EntityKind, EntityRef, FieldSet, LoadState,
    ObservableCollectionState, Operation, PendingUpdate, Snapshot, SnapshotDigest, UpdateId,
    UpdateOutcome, UpdateStatus, WallClock,
};
pub use crate::facade::{
    Completion, DebounceKey, Invoked, MutationFacade, MutationIntent, Page, PageApplied, PageCall,
    PageRequest, RemoteCall,
};
pub use crate::gate::DebounceGate;
pub use crate::ledger::{Ledger, LedgerError};
pub use crate::policy::{CallerHint, RetryDecision, RetryPolicy};
pub use crate::reconcile::{EntityPush, PageToken, PushChange, PushOutcome, Reconciler};
pub use crate::runtime::{
    CoordinatorHandle, Notification, Repository, SubmitResult, spawn, spawn_with_clock,
};
pub use crate::telemetry::{
    CoordinatorEvent, MemorySink, MetricsSink, NullSink, TelemetryConfig, init,
};
