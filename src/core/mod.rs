//! Core domain types for the sync coordinator.
//!
//! Module hierarchy follows type dependency order:
//! - time: WallClock (Layer 0)
//! - identity: UpdateId, EntityId, EntityRef (Layer 1)
//! - json_canon: canonical JSON bytes (Layer 2)
//! - snapshot: Snapshot, SnapshotDigest (Layer 3)
//! - update: PendingUpdate and its status machine (Layer 4)
//! - state: ObservableCollectionState (Layer 5)

pub mod identity;
pub mod json_canon;
pub mod snapshot;
pub mod state;
pub mod time;
pub mod update;

pub use identity::{EntityId, EntityKind, EntityRef, FieldSet, InvalidEntityId, UpdateId};
pub use json_canon::{CanonJsonError, to_canon_json_bytes};
pub use snapshot::{Snapshot, SnapshotDigest};
pub use state::{CollectionItem, LoadState, ObservableCollectionState};
pub use time::WallClock;
pub use update::{Operation, PendingUpdate, UpdateOutcome, UpdateStatus};
