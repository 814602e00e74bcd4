//! Shared fixtures: feature item types, ops, and a deterministically-clocked
//! facade rig.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ladle_sync::{
    CollectionItem, CoordinatorConfig, EntityId, EntityKind, EntityRef, FieldSet, Ledger,
    ManualClock, MemorySink, MutationFacade, MutationIntent, Operation, RetryConfig, WallClock,
};

// ---- feature items ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub id: String,
    pub is_read: bool,
    pub body: String,
}

impl CollectionItem for Notice {
    fn entity_id(&self) -> EntityId {
        EntityId::parse(&self.id).expect("fixture id")
    }

    fn counts_pending(&self) -> bool {
        !self.is_read
    }
}

pub fn notice(id: &str, is_read: bool) -> Notice {
    Notice {
        id: id.to_string(),
        is_read,
        body: format!("notice {id}"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFlag {
    pub id: String,
    pub saved: bool,
}

impl CollectionItem for SavedFlag {
    fn entity_id(&self) -> EntityId {
        EntityId::parse(&self.id).expect("fixture id")
    }
}

pub fn flag(id: &str, saved: bool) -> SavedFlag {
    SavedFlag {
        id: id.to_string(),
        saved,
    }
}

// ---- ops ----

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestOp {
    MarkRead { id: String },
    ToggleSaved { id: String, saved: bool },
    SubmitReview { listing: String, stars: u8 },
}

// ---- rig ----

pub struct Rig<T: CollectionItem> {
    pub facade: MutationFacade<T, TestOp>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<MemorySink>,
    pub ledger: Arc<Ledger>,
}

pub fn rig<T: CollectionItem>(feature: &str) -> Rig<T> {
    let config = CoordinatorConfig {
        retry: RetryConfig {
            jitter: false,
            ..RetryConfig::default()
        },
        ..CoordinatorConfig::default()
    };
    rig_with_config(feature, &config)
}

pub fn rig_with_config<T: CollectionItem>(feature: &str, config: &CoordinatorConfig) -> Rig<T> {
    let clock = Arc::new(ManualClock::new(WallClock(1_000_000)));
    let sink = Arc::new(MemorySink::default());
    let ledger = Arc::new(Ledger::new(config.ledger.retention()));
    let facade = MutationFacade::new(
        feature,
        config,
        ledger.clone(),
        clock.clone(),
        sink.clone(),
    );
    Rig {
        facade,
        clock,
        sink,
        ledger,
    }
}

impl<T: CollectionItem> Rig<T> {
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

// ---- entities ----

pub fn notice_entity(id: &str) -> EntityRef {
    EntityRef::new(
        EntityKind::Notification,
        EntityId::parse(id).expect("fixture id"),
        FieldSet::named(["is_read"]),
    )
}

pub fn flag_entity(id: &str) -> EntityRef {
    EntityRef::new(
        EntityKind::SavedItemFlag,
        EntityId::parse(id).expect("fixture id"),
        FieldSet::All,
    )
}

pub fn mark_read(id: &str) -> MutationIntent<Notice, TestOp> {
    MutationIntent {
        entity: notice_entity(id),
        operation: Operation::Toggle,
        op: TestOp::MarkRead { id: id.to_string() },
        optimistic: Some(notice(id, true)),
        debounce: None,
    }
}

pub fn toggle_saved(id: &str, saved: bool) -> MutationIntent<SavedFlag, TestOp> {
    MutationIntent {
        entity: flag_entity(id),
        operation: Operation::Toggle,
        op: TestOp::ToggleSaved {
            id: id.to_string(),
            saved,
        },
        optimistic: Some(flag(id, saved)),
        debounce: None,
    }
}
