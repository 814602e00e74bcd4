//! Pending-update ledger.
//!
//! The one structure shared between the facade's synchronous path and
//! background completion callbacks; all mutation funnels through `register`
//! and `resolve` under a single mutex. The ledger stores bookkeeping only —
//! applying or reverting collection state is the facade's job.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

use crate::core::{EntityRef, PendingUpdate, UpdateId, UpdateOutcome, UpdateStatus, WallClock};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    /// An unresolved update already targets the same entity and fields.
    #[error("entity {entity} already has an active mutation {existing}")]
    DuplicateActiveMutation {
        entity: String,
        existing: UpdateId,
    },

    #[error("update {0} is not in the ledger")]
    UnknownUpdate(UpdateId),

    /// Terminal transitions happen exactly once.
    #[error("update {id} already resolved as {status}")]
    AlreadyResolved { id: UpdateId, status: &'static str },
}

struct Resolved {
    update: PendingUpdate,
    resolved_at: WallClock,
}

#[derive(Default)]
struct Inner {
    active: HashMap<UpdateId, PendingUpdate>,
    /// Terminal entries kept for the retention window so late pushes can be
    /// recognized as duplicates.
    recent: HashMap<UpdateId, Resolved>,
}

/// In-memory table of in-flight optimistic mutations.
pub struct Ledger {
    inner: Mutex<Inner>,
    retention: Duration,
}

impl Ledger {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            retention,
        }
    }

    /// Insert a pending update; refuses overlapping active mutations.
    pub fn register(&self, update: PendingUpdate) -> Result<UpdateId, LedgerError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        if let Some(existing) = inner
            .active
            .values()
            .find(|active| active.entity.conflicts_with(&update.entity))
        {
            return Err(LedgerError::DuplicateActiveMutation {
                entity: update.entity.to_string(),
                existing: existing.id,
            });
        }
        let id = update.id;
        inner.active.insert(id, update);
        Ok(id)
    }

    /// Mark terminal. The entry stays queryable for the retention window.
    pub fn resolve(
        &self,
        id: UpdateId,
        outcome: UpdateOutcome,
        now: WallClock,
    ) -> Result<PendingUpdate, LedgerError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        if let Some(resolved) = inner.recent.get(&id) {
            return Err(LedgerError::AlreadyResolved {
                id,
                status: resolved.update.status.as_str(),
            });
        }
        let mut update = inner
            .active
            .remove(&id)
            .ok_or(LedgerError::UnknownUpdate(id))?;
        update.status = UpdateStatus::from(outcome);
        inner.recent.insert(
            id,
            Resolved {
                update: update.clone(),
                resolved_at: now,
            },
        );
        Ok(update)
    }

    /// Bump the attempt counter before a retry is issued.
    pub fn record_attempt(&self, id: UpdateId, now: WallClock) -> Result<u32, LedgerError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        let update = inner
            .active
            .get_mut(&id)
            .ok_or(LedgerError::UnknownUpdate(id))?;
        update.retry_count += 1;
        update.last_attempt_at = now;
        Ok(update.retry_count)
    }

    pub fn get(&self, id: UpdateId) -> Option<PendingUpdate> {
        let inner = self.inner.lock().expect("ledger lock");
        inner
            .active
            .get(&id)
            .or_else(|| inner.recent.get(&id).map(|r| &r.update))
            .cloned()
    }

    /// Unresolved updates targeting the given entity.
    pub fn active_for(&self, entity: &EntityRef) -> Vec<PendingUpdate> {
        let inner = self.inner.lock().expect("ledger lock");
        inner
            .active
            .values()
            .filter(|update| update.entity.same_entity(entity))
            .cloned()
            .collect()
    }

    /// Active or recently-resolved update for the entity, newest first.
    ///
    /// This is the lookup push reconciliation uses: a push arriving shortly
    /// after confirmation must still be recognized as a duplicate.
    pub fn active_or_recent_for(&self, entity: &EntityRef, now: WallClock) -> Option<PendingUpdate> {
        let inner = self.inner.lock().expect("ledger lock");
        if let Some(update) = inner
            .active
            .values()
            .find(|update| update.entity.same_entity(entity))
        {
            return Some(update.clone());
        }
        inner
            .recent
            .values()
            .filter(|r| {
                r.update.entity.same_entity(entity)
                    && now.since(r.resolved_at) <= self.retention.as_millis() as u64
            })
            .max_by_key(|r| r.resolved_at)
            .map(|r| r.update.clone())
    }

    /// Drop terminal entries older than the retention window.
    pub fn purge(&self, now: WallClock) {
        let retention_ms = self.retention.as_millis() as u64;
        let mut inner = self.inner.lock().expect("ledger lock");
        inner
            .recent
            .retain(|_, r| now.since(r.resolved_at) <= retention_ms);
    }

    pub fn active_len(&self) -> usize {
        self.inner.lock().expect("ledger lock").active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityId, EntityKind, FieldSet, Operation};

    fn entity(id: &str, fields: FieldSet) -> EntityRef {
        EntityRef::new(EntityKind::Notification, EntityId::parse(id).unwrap(), fields)
    }

    fn pending(id: &str, fields: FieldSet) -> PendingUpdate {
        PendingUpdate::new(
            entity(id, fields),
            Operation::Toggle,
            None,
            None,
            WallClock(1_000),
        )
    }

    fn ledger() -> Ledger {
        Ledger::new(Duration::from_secs(30))
    }

    #[test]
    fn register_rejects_overlapping_fields() {
        let ledger = ledger();
        let first = pending("n-1", FieldSet::named(["is_read"]));
        let first_id = ledger.register(first).unwrap();

        let overlapping = pending("n-1", FieldSet::named(["is_read", "archived"]));
        let err = ledger.register(overlapping).unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateActiveMutation {
                entity: "notification/n-1".to_string(),
                existing: first_id,
            }
        );

        // disjoint fields on the same entity are allowed
        let disjoint = pending("n-1", FieldSet::named(["archived"]));
        ledger.register(disjoint).unwrap();
        assert_eq!(ledger.active_len(), 2);
    }

    #[test]
    fn resolve_is_terminal_exactly_once() {
        let ledger = ledger();
        let id = ledger.register(pending("n-1", FieldSet::All)).unwrap();

        let resolved = ledger
            .resolve(id, UpdateOutcome::Confirmed, WallClock(2_000))
            .unwrap();
        assert_eq!(resolved.status, UpdateStatus::Confirmed);

        let err = ledger
            .resolve(id, UpdateOutcome::RolledBack, WallClock(2_001))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::AlreadyResolved {
                id,
                status: "confirmed"
            }
        );
    }

    #[test]
    fn resolved_entry_queryable_within_retention_then_purged() {
        let ledger = ledger();
        let target = entity("n-1", FieldSet::All);
        let id = ledger.register(pending("n-1", FieldSet::All)).unwrap();
        ledger
            .resolve(id, UpdateOutcome::Confirmed, WallClock(10_000))
            .unwrap();

        assert!(ledger
            .active_or_recent_for(&target, WallClock(35_000))
            .is_some());
        assert!(ledger
            .active_or_recent_for(&target, WallClock(50_000))
            .is_none());

        ledger.purge(WallClock(50_000));
        assert!(ledger.get(id).is_none());
    }

    #[test]
    fn record_attempt_bumps_counter() {
        let ledger = ledger();
        let id = ledger.register(pending("n-1", FieldSet::All)).unwrap();
        assert_eq!(ledger.record_attempt(id, WallClock(1_400)).unwrap(), 1);
        assert_eq!(ledger.record_attempt(id, WallClock(2_200)).unwrap(), 2);
        let update = ledger.get(id).unwrap();
        assert_eq!(update.retry_count, 2);
        assert_eq!(update.last_attempt_at, WallClock(2_200));
    }
}
