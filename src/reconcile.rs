//! Reconciliation: merging authoritative server data into optimistic state.
//!
//! Three hazards are handled here:
//! - a server response overwriting a since-changed optimistic value
//!   (authoritative data always wins),
//! - a real-time push duplicating an already-applied local mutation,
//! - pagination appends racing a concurrent refresh.
//!
//! Reconciliation never fails outward; divergence is resolved
//! authoritative-wins and logged.

use crate::core::{
    CollectionItem, EntityRef, ObservableCollectionState, PendingUpdate, Snapshot, UpdateId,
    UpdateStatus, WallClock,
};
use crate::ledger::Ledger;

/// Out-of-band entity change delivered by the real-time subscription.
#[derive(Clone, Debug)]
pub struct EntityPush<T> {
    pub entity: EntityRef,
    pub change: PushChange<T>,
}

#[derive(Clone, Debug)]
pub enum PushChange<T> {
    Upsert(T),
    Delete,
}

/// How a push was absorbed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Payload matched a pending update; treated as its confirmation.
    ConfirmsPending(UpdateId),
    /// Payload matched a recently-resolved update; dropped.
    Suppressed,
    /// Payload differed from the local value; authoritative payload applied.
    /// Carries the pending update it superseded, if any.
    AuthoritativeWins(Option<UpdateId>),
    /// No related ledger entry; applied as a plain upstream change.
    Applied,
}

/// Cursor-ordered page application with refresh-epoch invalidation.
///
/// A refresh bumps the epoch; page results carrying an older epoch are
/// stale by definition and must be dropped, whatever order the network
/// delivered them in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageToken {
    pub epoch: u64,
    pub offset: usize,
}

pub struct Reconciler {
    page_epoch: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self { page_epoch: 0 }
    }

    // ---- confirm path ----

    /// Fold a successful remote completion into the observable state.
    ///
    /// Returns true when the authoritative value differed from the
    /// optimistic one and replaced it.
    pub fn confirm<T: CollectionItem>(
        &self,
        update: &PendingUpdate,
        authoritative: Option<&T>,
        state: &mut ObservableCollectionState<T>,
    ) -> bool {
        let Some(value) = authoritative else {
            // No authoritative body (e.g. delete acks); optimistic state stands.
            return false;
        };

        let Ok(snapshot) = Snapshot::capture(value) else {
            tracing::warn!(entity = %update.entity, "authoritative value not snapshotable; keeping optimistic state");
            return false;
        };
        let matches_optimistic = update
            .optimistic
            .as_ref()
            .is_some_and(|optimistic| optimistic.same_value(&snapshot));
        if matches_optimistic {
            return false;
        }

        self.apply_authoritative(update, value.clone(), state);
        true
    }

    fn apply_authoritative<T: CollectionItem>(
        &self,
        update: &PendingUpdate,
        value: T,
        state: &mut ObservableCollectionState<T>,
    ) {
        if state.replace(value.clone()) {
            return;
        }
        // Server may have re-keyed the entity (e.g. a create that traded a
        // client-temporary id for the server id).
        if let Some((index, _)) = state.remove(&update.entity.id) {
            state.insert_at(index, value);
        } else {
            state.insert_front(value);
        }
    }

    // ---- push reconciliation ----

    /// Absorb a real-time push, suppressing duplicates of local mutations.
    pub fn absorb_push<T: CollectionItem>(
        &self,
        push: &EntityPush<T>,
        ledger: &Ledger,
        state: &mut ObservableCollectionState<T>,
        now: WallClock,
    ) -> PushOutcome {
        let related = ledger.active_or_recent_for(&push.entity, now);

        let Some(update) = related else {
            self.apply_push(push, state);
            return PushOutcome::Applied;
        };

        if self.push_matches_update(push, &update) {
            if update.status == UpdateStatus::Pending {
                return PushOutcome::ConfirmsPending(update.id);
            }
            tracing::debug!(entity = %push.entity, "late push matched resolved update");
            return PushOutcome::Suppressed;
        }

        // Divergent payload: the server knows better.
        self.apply_push(push, state);
        let superseded = (update.status == UpdateStatus::Pending).then_some(update.id);
        PushOutcome::AuthoritativeWins(superseded)
    }

    fn push_matches_update<T: CollectionItem>(
        &self,
        push: &EntityPush<T>,
        update: &PendingUpdate,
    ) -> bool {
        match &push.change {
            PushChange::Delete => update.optimistic.is_none(),
            PushChange::Upsert(value) => match (&update.optimistic, Snapshot::capture(value)) {
                (Some(optimistic), Ok(snapshot)) => optimistic.same_value(&snapshot),
                _ => false,
            },
        }
    }

    fn apply_push<T: CollectionItem>(
        &self,
        push: &EntityPush<T>,
        state: &mut ObservableCollectionState<T>,
    ) {
        match &push.change {
            PushChange::Upsert(value) => {
                if !state.replace(value.clone()) {
                    state.insert_front(value.clone());
                }
            }
            PushChange::Delete => {
                if state.remove(&push.entity.id).is_some() {
                    tracing::info!(entity = %push.entity, "entity removed by upstream change");
                }
            }
        }
    }

    // ---- pagination epochs ----

    /// Invalidate every in-flight page result and start a new epoch.
    pub fn begin_refresh(&mut self) -> PageToken {
        self.page_epoch += 1;
        PageToken {
            epoch: self.page_epoch,
            offset: 0,
        }
    }

    /// Token for a page append within the current epoch.
    pub fn page_token(&self, offset: usize) -> PageToken {
        PageToken {
            epoch: self.page_epoch,
            offset,
        }
    }

    pub fn accepts(&self, token: PageToken) -> bool {
        token.epoch == self.page_epoch
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityId, EntityKind, FieldSet, Operation};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Flag {
        id: String,
        saved: bool,
    }

    impl CollectionItem for Flag {
        fn entity_id(&self) -> EntityId {
            EntityId::parse(&self.id).expect("test id")
        }
    }

    fn flag(id: &str, saved: bool) -> Flag {
        Flag {
            id: id.to_string(),
            saved,
        }
    }

    fn entity(id: &str) -> EntityRef {
        EntityRef::new(
            EntityKind::SavedItemFlag,
            EntityId::parse(id).unwrap(),
            FieldSet::All,
        )
    }

    fn pending_toggle(id: &str, optimistic: &Flag) -> PendingUpdate {
        PendingUpdate::new(
            entity(id),
            Operation::Toggle,
            None,
            Some(Snapshot::capture(optimistic).unwrap()),
            WallClock(1_000),
        )
    }

    #[test]
    fn confirm_keeps_matching_optimistic_value() {
        let reconciler = Reconciler::new();
        let optimistic = flag("s-1", true);
        let mut state = ObservableCollectionState::from_items(vec![optimistic.clone()]);
        let update = pending_toggle("s-1", &optimistic);

        let overridden = reconciler.confirm(&update, Some(&optimistic), &mut state);
        assert!(!overridden);
        assert_eq!(state.items()[0], optimistic);
    }

    #[test]
    fn confirm_replaces_divergent_optimistic_value() {
        let reconciler = Reconciler::new();
        let optimistic = flag("s-1", true);
        let mut state = ObservableCollectionState::from_items(vec![optimistic.clone()]);
        let update = pending_toggle("s-1", &optimistic);

        let server_value = flag("s-1", false);
        let overridden = reconciler.confirm(&update, Some(&server_value), &mut state);
        assert!(overridden);
        assert_eq!(state.items()[0], server_value);
    }

    #[test]
    fn push_with_unknown_entity_is_applied() {
        let reconciler = Reconciler::new();
        let ledger = Ledger::new(Duration::from_secs(30));
        let mut state = ObservableCollectionState::from_items(vec![]);

        let push = EntityPush {
            entity: entity("s-9"),
            change: PushChange::Upsert(flag("s-9", true)),
        };
        let outcome = reconciler.absorb_push(&push, &ledger, &mut state, WallClock(2_000));
        assert_eq!(outcome, PushOutcome::Applied);
        assert_eq!(state.items().len(), 1);
    }

    #[test]
    fn matching_push_confirms_pending_update() {
        let reconciler = Reconciler::new();
        let ledger = Ledger::new(Duration::from_secs(30));
        let optimistic = flag("s-1", true);
        let mut state = ObservableCollectionState::from_items(vec![optimistic.clone()]);
        let id = ledger
            .register(pending_toggle("s-1", &optimistic))
            .unwrap();

        let push = EntityPush {
            entity: entity("s-1"),
            change: PushChange::Upsert(optimistic.clone()),
        };
        let outcome = reconciler.absorb_push(&push, &ledger, &mut state, WallClock(2_000));
        assert_eq!(outcome, PushOutcome::ConfirmsPending(id));
        // no visible state change
        assert_eq!(state.items(), &[optimistic]);
    }

    #[test]
    fn divergent_push_wins_over_pending_update() {
        let reconciler = Reconciler::new();
        let ledger = Ledger::new(Duration::from_secs(30));
        let optimistic = flag("s-1", true);
        let mut state = ObservableCollectionState::from_items(vec![optimistic.clone()]);
        let id = ledger
            .register(pending_toggle("s-1", &optimistic))
            .unwrap();

        let server_value = flag("s-1", false);
        let push = EntityPush {
            entity: entity("s-1"),
            change: PushChange::Upsert(server_value.clone()),
        };
        let outcome = reconciler.absorb_push(&push, &ledger, &mut state, WallClock(2_000));
        assert_eq!(outcome, PushOutcome::AuthoritativeWins(Some(id)));
        assert_eq!(state.items()[0], server_value);
    }

    #[test]
    fn refresh_invalidates_outstanding_page_tokens() {
        let mut reconciler = Reconciler::new();
        let stale = reconciler.page_token(20);
        let refresh = reconciler.begin_refresh();
        assert!(!reconciler.accepts(stale));
        assert!(reconciler.accepts(refresh));
        assert!(reconciler.accepts(reconciler.page_token(20)));
    }
}
