//! Mutation facade: the per-feature entry point.
//!
//! One facade instance owns one observable collection and serializes every
//! mutation against it. The facade itself never sleeps and never touches the
//! network: `invoke` hands back the remote call to issue, `complete` routes
//! the result through classification, policy, and reconciliation, and
//! `due_retries` surfaces re-issues when their backoff expires. A runtime
//! (see `crate::runtime`) drives those edges against a real repository.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::classify::{ClassificationTable, ErrorCategory};
use crate::clock::Clock;
use crate::config::CoordinatorConfig;
use crate::core::{
    CollectionItem, EntityId, EntityRef, LoadState, ObservableCollectionState, Operation,
    PendingUpdate, Snapshot, UpdateId, UpdateOutcome, WallClock,
};
use crate::error::{Error, RemoteError};
use crate::gate::DebounceGate;
use crate::ledger::Ledger;
use crate::policy::{CallerHint, RetryDecision, RetryPolicy};
use crate::reconcile::{EntityPush, PageToken, PushOutcome, Reconciler};
use crate::telemetry::{CoordinatorEvent, MetricsSink, emit};

// =============================================================================
// Requests and results
// =============================================================================

/// Debounce key for a mutation or refresh; `cooldown: None` uses the
/// configured default.
#[derive(Clone, Debug)]
pub struct DebounceKey {
    pub key: String,
    pub cooldown: Option<Duration>,
}

impl DebounceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cooldown: None,
        }
    }

    pub fn with_cooldown(key: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            key: key.into(),
            cooldown: Some(cooldown),
        }
    }
}

/// One requested mutation, described declaratively.
///
/// `op` is the opaque repository operation the runtime will execute;
/// `optimistic` is the value applied locally (absent for deletes).
#[derive(Clone, Debug)]
pub struct MutationIntent<T, Op> {
    pub entity: EntityRef,
    pub operation: Operation,
    pub op: Op,
    pub optimistic: Option<T>,
    pub debounce: Option<DebounceKey>,
}

/// A remote call the runtime must issue.
#[derive(Clone, Debug)]
pub struct RemoteCall<Op> {
    pub update_id: UpdateId,
    pub op: Op,
}

/// Immediate result of `invoke`.
#[derive(Clone, Debug)]
pub enum Invoked<Op> {
    /// Optimistic state applied; issue this call.
    Started(RemoteCall<Op>),
    /// Local precondition made this a no-op; nothing registered, nothing
    /// issued.
    NoOp,
    /// Rejected by the debounce gate; optimistic state unchanged.
    Debounced,
}

/// Terminal routing of a completed remote call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    Confirmed {
        overridden: bool,
    },
    RetryScheduled {
        due: WallClock,
        attempt: u32,
    },
    RolledBack {
        category: ErrorCategory,
        hint: Option<CallerHint>,
        message: String,
    },
    /// Validation refusal: optimistic state left untouched, raw message
    /// surfaced.
    Failed {
        message: String,
    },
    /// Late completion for an update that is no longer in flight (cancelled
    /// or already confirmed by a push). Dropped.
    Ignored,
}

/// Offset-based page request handed to the repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

/// A page load the runtime must issue.
#[derive(Clone, Copy, Debug)]
pub struct PageCall {
    pub token: PageToken,
    pub request: PageRequest,
}

/// Authoritative page of items.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub end_of_collection: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageApplied {
    Applied,
    /// Result raced a refresh and lost; dropped.
    Stale,
    Failed(ErrorCategory),
}

// =============================================================================
// Facade
// =============================================================================

enum RollbackPlan {
    /// Create: drop the optimistically inserted item.
    RemoveInserted(EntityId),
    /// Update/Toggle: restore the pre-mutation value.
    Restore(Snapshot),
    /// Delete: reinsert the removed item where it was.
    Reinsert { index: usize, snapshot: Snapshot },
}

struct InFlight<Op> {
    op: Op,
    rollback: RollbackPlan,
    /// Due-time of a scheduled retry; `None` while the call is on the wire.
    retry_due: Option<WallClock>,
}

pub struct MutationFacade<T: CollectionItem, Op: Clone> {
    feature: String,
    state: ObservableCollectionState<T>,
    ledger: Arc<Ledger>,
    gate: DebounceGate,
    classifier: ClassificationTable,
    policy: RetryPolicy,
    reconciler: Reconciler,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    inflight: HashMap<UpdateId, InFlight<Op>>,
    default_cooldown: Duration,
}

impl<T: CollectionItem, Op: Clone> MutationFacade<T, Op> {
    pub fn new(
        feature: impl Into<String>,
        config: &CoordinatorConfig,
        ledger: Arc<Ledger>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            feature: feature.into(),
            state: ObservableCollectionState::default(),
            ledger,
            gate: DebounceGate::new(clock.clone()),
            classifier: ClassificationTable::default(),
            policy: RetryPolicy::new(config.retry.clone()),
            reconciler: Reconciler::new(),
            clock,
            metrics,
            inflight: HashMap::new(),
            default_cooldown: config.debounce.default_cooldown(),
        }
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// UI-facing view. Read-only: the facade is the single writer.
    pub fn state(&self) -> &ObservableCollectionState<T> {
        &self.state
    }

    /// Replace the collection wholesale (initial load, authoritative
    /// refetch after a conflict).
    pub fn seed(&mut self, items: Vec<T>) {
        self.state.replace_all(items);
        self.state.set_load_state(LoadState::Loaded);
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Apply a mutation optimistically and hand back the remote call.
    ///
    /// Ordering per entity is enforced here: a second mutation touching the
    /// same fields is refused with `DuplicateActiveMutation` until the first
    /// resolves, so a rollback can never interleave with a newer apply.
    pub fn invoke(&mut self, intent: MutationIntent<T, Op>) -> Result<Invoked<Op>, Error> {
        if self.is_noop(&intent)? {
            return Ok(Invoked::NoOp);
        }

        if let Some(debounce) = &intent.debounce {
            let cooldown = debounce.cooldown.unwrap_or(self.default_cooldown);
            if !self.gate.should_proceed(&debounce.key, cooldown) {
                return Ok(Invoked::Debounced);
            }
        }

        let now = self.clock.now();
        let original = self
            .state
            .get(&intent.entity.id)
            .map(Snapshot::capture)
            .transpose()?;
        let optimistic = intent
            .optimistic
            .as_ref()
            .map(Snapshot::capture)
            .transpose()?;

        let rollback = self.rollback_plan(&intent, &original);
        let update = PendingUpdate::new(
            intent.entity.clone(),
            intent.operation,
            original,
            optimistic,
            now,
        );
        let update_id = self.ledger.register(update)?;

        self.apply_optimistic(&intent);
        emit(
            &self.metrics,
            CoordinatorEvent::MutationApplied {
                update_id,
                entity: intent.entity.clone(),
            },
        );

        self.inflight.insert(
            update_id,
            InFlight {
                op: intent.op.clone(),
                rollback,
                retry_due: None,
            },
        );
        Ok(Invoked::Started(RemoteCall {
            update_id,
            op: intent.op,
        }))
    }

    fn is_noop(&self, intent: &MutationIntent<T, Op>) -> Result<bool, Error> {
        let current = self.state.get(&intent.entity.id);
        Ok(match intent.operation {
            Operation::Create => current.is_some(),
            Operation::Delete => current.is_none(),
            Operation::Update | Operation::Toggle => match (current, &intent.optimistic) {
                // Entity gone: an authoritative removal already won.
                (None, _) => true,
                (Some(current), Some(target)) => {
                    Snapshot::capture(current)?.same_value(&Snapshot::capture(target)?)
                }
                (Some(_), None) => false,
            },
        })
    }

    fn rollback_plan(
        &self,
        intent: &MutationIntent<T, Op>,
        original: &Option<Snapshot>,
    ) -> RollbackPlan {
        match intent.operation {
            Operation::Create => RollbackPlan::RemoveInserted(intent.entity.id.clone()),
            Operation::Update | Operation::Toggle => match original {
                Some(snapshot) => RollbackPlan::Restore(snapshot.clone()),
                // is_noop filtered the missing-entity case already
                None => RollbackPlan::RemoveInserted(intent.entity.id.clone()),
            },
            Operation::Delete => {
                let index = self
                    .state
                    .position_of(&intent.entity.id)
                    .unwrap_or_default();
                match original {
                    Some(snapshot) => RollbackPlan::Reinsert {
                        index,
                        snapshot: snapshot.clone(),
                    },
                    None => RollbackPlan::RemoveInserted(intent.entity.id.clone()),
                }
            }
        }
    }

    fn apply_optimistic(&mut self, intent: &MutationIntent<T, Op>) {
        match intent.operation {
            Operation::Create => {
                if let Some(value) = &intent.optimistic {
                    self.state.insert_front(value.clone());
                }
            }
            Operation::Update | Operation::Toggle => {
                if let Some(value) = &intent.optimistic {
                    self.state.replace(value.clone());
                }
            }
            Operation::Delete => {
                self.state.remove(&intent.entity.id);
            }
        }
    }

    /// Route a remote completion. Success goes through the confirm path;
    /// failure through classification and the policy table.
    pub fn complete(
        &mut self,
        update_id: UpdateId,
        result: Result<Option<T>, RemoteError>,
    ) -> Completion {
        if !self.inflight.contains_key(&update_id) {
            return Completion::Ignored;
        }
        match result {
            Ok(authoritative) => self.confirm(update_id, authoritative),
            Err(error) => self.handle_failure(update_id, error),
        }
    }

    fn confirm(&mut self, update_id: UpdateId, authoritative: Option<T>) -> Completion {
        let now = self.clock.now();
        let update = match self
            .ledger
            .resolve(update_id, UpdateOutcome::Confirmed, now)
        {
            Ok(update) => update,
            Err(_) => {
                // A push confirmed (or a cancel resolved) this update first.
                self.inflight.remove(&update_id);
                return Completion::Ignored;
            }
        };
        self.inflight.remove(&update_id);

        let overridden = self
            .reconciler
            .confirm(&update, authoritative.as_ref(), &mut self.state);
        emit(
            &self.metrics,
            CoordinatorEvent::MutationConfirmed {
                update_id,
                entity: update.entity,
                overridden,
            },
        );
        Completion::Confirmed { overridden }
    }

    fn handle_failure(&mut self, update_id: UpdateId, error: RemoteError) -> Completion {
        let Some(update) = self.ledger.get(update_id) else {
            self.inflight.remove(&update_id);
            return Completion::Ignored;
        };
        if update.status.is_terminal() {
            self.inflight.remove(&update_id);
            return Completion::Ignored;
        }

        let category = self.classifier.classify(&error);
        let message = error
            .user_message()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());

        match self.policy.decide(&update, category) {
            RetryDecision::Retry { delay } => {
                let now = self.clock.now();
                let attempt = self
                    .ledger
                    .record_attempt(update_id, now)
                    .unwrap_or(update.retry_count + 1);
                let due = now + delay;
                if let Some(inflight) = self.inflight.get_mut(&update_id) {
                    inflight.retry_due = Some(due);
                }
                emit(
                    &self.metrics,
                    CoordinatorEvent::RetryScheduled {
                        update_id,
                        entity: update.entity,
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    },
                );
                Completion::RetryScheduled { due, attempt }
            }
            RetryDecision::Rollback { hint } => {
                self.rollback(update_id, category);
                Completion::RolledBack {
                    category,
                    hint,
                    message,
                }
            }
            RetryDecision::Surface => {
                let now = self.clock.now();
                let _ = self.ledger.resolve(update_id, UpdateOutcome::Failed, now);
                self.inflight.remove(&update_id);
                tracing::info!(
                    feature = %self.feature,
                    %update_id,
                    "validation refused; optimistic state left in place"
                );
                Completion::Failed { message }
            }
        }
    }

    fn rollback(&mut self, update_id: UpdateId, category: ErrorCategory) {
        let now = self.clock.now();
        let Some(inflight) = self.inflight.remove(&update_id) else {
            return;
        };
        let Ok(update) = self.ledger.resolve(update_id, UpdateOutcome::RolledBack, now) else {
            return;
        };

        match inflight.rollback {
            RollbackPlan::RemoveInserted(id) => {
                self.state.remove(&id);
            }
            RollbackPlan::Restore(snapshot) => match snapshot.restore::<T>() {
                Ok(value) => {
                    self.state.replace(value);
                }
                Err(e) => {
                    tracing::warn!(feature = %self.feature, %update_id, "rollback snapshot decode failed: {e}");
                }
            },
            RollbackPlan::Reinsert { index, snapshot } => match snapshot.restore::<T>() {
                Ok(value) => self.state.insert_at(index, value),
                Err(e) => {
                    tracing::warn!(feature = %self.feature, %update_id, "rollback snapshot decode failed: {e}");
                }
            },
        }

        emit(
            &self.metrics,
            CoordinatorEvent::MutationRolledBack {
                update_id,
                entity: update.entity,
                category,
            },
        );
    }

    // -------------------------------------------------------------------------
    // Retry scheduling
    // -------------------------------------------------------------------------

    /// Calls whose backoff expired; the runtime re-issues them.
    pub fn due_retries(&mut self, now: WallClock) -> Vec<RemoteCall<Op>> {
        let mut due = Vec::new();
        for (id, inflight) in &mut self.inflight {
            if let Some(when) = inflight.retry_due
                && when <= now
            {
                inflight.retry_due = None;
                due.push(RemoteCall {
                    update_id: *id,
                    op: inflight.op.clone(),
                });
            }
        }
        due
    }

    /// Earliest scheduled retry, for the runtime's timer.
    pub fn next_due(&self) -> Option<WallClock> {
        self.inflight
            .values()
            .filter_map(|inflight| inflight.retry_due)
            .min()
    }

    /// Cancel one in-flight mutation: its scheduled retry is dropped and the
    /// optimistic change rolled back. A late completion from the wire is
    /// ignored.
    pub fn cancel(&mut self, update_id: UpdateId) {
        if self.inflight.contains_key(&update_id) {
            self.rollback(update_id, ErrorCategory::Network);
        }
    }

    /// Screen teardown: cancel everything still in flight.
    pub fn teardown(&mut self) {
        let ids: Vec<UpdateId> = self.inflight.keys().copied().collect();
        for id in ids {
            self.cancel(id);
        }
    }

    // -------------------------------------------------------------------------
    // Real-time push
    // -------------------------------------------------------------------------

    /// Feed an out-of-band entity change from the subscription.
    pub fn absorb_push(&mut self, push: EntityPush<T>) {
        let now = self.clock.now();
        let outcome = self
            .reconciler
            .absorb_push(&push, &self.ledger, &mut self.state, now);
        match outcome {
            PushOutcome::ConfirmsPending(update_id) => {
                self.inflight.remove(&update_id);
                let _ = self
                    .ledger
                    .resolve(update_id, UpdateOutcome::Confirmed, now);
                emit(
                    &self.metrics,
                    CoordinatorEvent::DuplicateSuppressed {
                        entity: push.entity.clone(),
                    },
                );
                emit(
                    &self.metrics,
                    CoordinatorEvent::MutationConfirmed {
                        update_id,
                        entity: push.entity,
                        overridden: false,
                    },
                );
            }
            PushOutcome::Suppressed => {
                emit(
                    &self.metrics,
                    CoordinatorEvent::DuplicateSuppressed {
                        entity: push.entity,
                    },
                );
            }
            PushOutcome::AuthoritativeWins(superseded) => {
                if let Some(update_id) = superseded {
                    self.inflight.remove(&update_id);
                    let _ = self
                        .ledger
                        .resolve(update_id, UpdateOutcome::Confirmed, now);
                    emit(
                        &self.metrics,
                        CoordinatorEvent::MutationConfirmed {
                            update_id,
                            entity: push.entity,
                            overridden: true,
                        },
                    );
                }
            }
            PushOutcome::Applied => {}
        }
    }

    // -------------------------------------------------------------------------
    // Loading and pagination
    // -------------------------------------------------------------------------

    /// Refresh from the top. Bumps the page epoch so every in-flight page
    /// append becomes stale.
    pub fn begin_refresh(&mut self, limit: usize, debounce: Option<DebounceKey>) -> Option<PageCall> {
        if let Some(debounce) = debounce {
            let cooldown = debounce.cooldown.unwrap_or(self.default_cooldown);
            if !self.gate.should_proceed(&debounce.key, cooldown) {
                return None;
            }
        }
        let token = self.reconciler.begin_refresh();
        self.state.set_load_state(LoadState::Loading);
        Some(PageCall {
            token,
            request: PageRequest { offset: 0, limit },
        })
    }

    /// Load the next page within the current epoch.
    pub fn begin_load_page(&mut self, offset: usize, limit: usize) -> PageCall {
        self.state.set_load_state(LoadState::Loading);
        PageCall {
            token: self.reconciler.page_token(offset),
            request: PageRequest { offset, limit },
        }
    }

    /// Apply a page result. Ordering comes from the request's offset, never
    /// from network arrival order; results from a superseded epoch are
    /// dropped.
    pub fn apply_page(
        &mut self,
        call: PageCall,
        result: Result<Page<T>, RemoteError>,
    ) -> PageApplied {
        // A page is stale when its epoch was superseded by a refresh, or when
        // it arrived ahead of its predecessor and cannot be cursor-ordered.
        if !self.reconciler.accepts(call.token) || call.token.offset > self.state.items().len() {
            emit(
                &self.metrics,
                CoordinatorEvent::StalePageDropped {
                    feature: self.feature.clone(),
                    offset: call.token.offset,
                },
            );
            return PageApplied::Stale;
        }
        match result {
            Ok(page) => {
                self.state
                    .splice_page(call.token.offset, page.items, page.end_of_collection);
                self.state.set_load_state(LoadState::Loaded);
                PageApplied::Applied
            }
            Err(error) => {
                let category = self.classifier.classify(&error);
                self.state
                    .set_load_state(LoadState::Failed(error.to_string()));
                PageApplied::Failed(category)
            }
        }
    }

    /// Drop terminal ledger entries older than the retention window.
    pub fn maintain(&mut self) {
        self.ledger.purge(self.clock.now());
    }
}
