//! Identity types: update ids, entity references, field sets.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Invalid identifier string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("entity id `{raw}` is invalid: {reason}")]
pub struct InvalidEntityId {
    pub raw: String,
    pub reason: String,
}

/// Opaque identifier for one in-flight optimistic mutation.
///
/// Generated at optimistic-apply time; never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UpdateId(Uuid);

impl UpdateId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned entity identifier, carried verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(raw: &str) -> Result<Self, InvalidEntityId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidEntityId {
                raw: raw.to_string(),
                reason: "empty".to_string(),
            });
        }
        if trimmed.len() > 128 {
            return Err(InvalidEntityId {
                raw: raw.to_string(),
                reason: format!("length {} exceeds max 128", trimmed.len()),
            });
        }
        if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(InvalidEntityId {
                raw: raw.to_string(),
                reason: "contains whitespace or control characters".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of entity a mutation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Notification,
    Review,
    SavedItemFlag,
    ProfileField,
    Listing,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Notification => "notification",
            EntityKind::Review => "review",
            EntityKind::SavedItemFlag => "saved_item_flag",
            EntityKind::ProfileField => "profile_field",
            EntityKind::Listing => "listing",
        }
    }
}

/// The fields a mutation touches on its entity.
///
/// Two sets overlap when either is `All` or they share a named field. The
/// ledger uses overlap to refuse a second concurrent mutation on the same
/// entity fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSet {
    All,
    Named(BTreeSet<String>),
}

impl FieldSet {
    pub fn named<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSet::Named(fields.into_iter().map(Into::into).collect())
    }

    pub fn overlaps(&self, other: &FieldSet) -> bool {
        match (self, other) {
            (FieldSet::All, _) | (_, FieldSet::All) => true,
            (FieldSet::Named(a), FieldSet::Named(b)) => a.intersection(b).next().is_some(),
        }
    }
}

/// Weak reference to the entity a mutation targets: lookup only, never
/// ownership of collection state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
    pub fields: FieldSet,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId, fields: FieldSet) -> Self {
        Self { kind, id, fields }
    }

    /// Same entity, regardless of which fields are touched.
    pub fn same_entity(&self, other: &EntityRef) -> bool {
        self.kind == other.kind && self.id == other.id
    }

    /// Same entity and overlapping field sets.
    pub fn conflicts_with(&self, other: &EntityRef) -> bool {
        self.same_entity(other) && self.fields.overlaps(&other.fields)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}
