//! Pending-update records: one in-flight optimistic mutation each.

use super::identity::{EntityRef, UpdateId};
use super::snapshot::Snapshot;
use super::time::WallClock;

/// What shape of change a mutation applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Toggle,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Toggle => "toggle",
        }
    }
}

/// Lifecycle of a pending update.
///
/// Pending transitions to exactly one of the terminal states, exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateStatus {
    Pending,
    Confirmed,
    RolledBack,
    Failed,
}

impl UpdateStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, UpdateStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStatus::Pending => "pending",
            UpdateStatus::Confirmed => "confirmed",
            UpdateStatus::RolledBack => "rolled_back",
            UpdateStatus::Failed => "failed",
        }
    }
}

/// Terminal outcome passed to `Ledger::resolve`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Confirmed,
    RolledBack,
    Failed,
}

impl From<UpdateOutcome> for UpdateStatus {
    fn from(outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::Confirmed => UpdateStatus::Confirmed,
            UpdateOutcome::RolledBack => UpdateStatus::RolledBack,
            UpdateOutcome::Failed => UpdateStatus::Failed,
        }
    }
}

/// One in-flight optimistic mutation.
///
/// Created by the facade at optimistic-apply time; status and retry fields
/// are advanced only through the ledger. Holds snapshots, never the live
/// collection items.
#[derive(Clone, Debug)]
pub struct PendingUpdate {
    pub id: UpdateId,
    pub entity: EntityRef,
    pub operation: Operation,
    /// Pre-mutation value; `None` for Create.
    pub original: Option<Snapshot>,
    /// Value applied locally; `None` for Delete.
    pub optimistic: Option<Snapshot>,
    pub retry_count: u32,
    pub created_at: WallClock,
    pub last_attempt_at: WallClock,
    pub status: UpdateStatus,
}

impl PendingUpdate {
    pub fn new(
        entity: EntityRef,
        operation: Operation,
        original: Option<Snapshot>,
        optimistic: Option<Snapshot>,
        now: WallClock,
    ) -> Self {
        Self {
            id: UpdateId::generate(),
            entity,
            operation,
            original,
            optimistic,
            retry_count: 0,
            created_at: now,
            last_attempt_at: now,
            status: UpdateStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!UpdateStatus::Pending.is_terminal());
        assert!(UpdateStatus::Confirmed.is_terminal());
        assert!(UpdateStatus::RolledBack.is_terminal());
        assert!(UpdateStatus::Failed.is_terminal());
    }
}
