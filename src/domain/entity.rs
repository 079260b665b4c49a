//! Entity model for comments, replies, messages and toggles.
//!
//! Entities created locally carry an [`EntityId::Temporary`] id until the server
//! confirms them. Reconciliation matches on the id variant, so a temporary id
//! can never be confused with a server id that happens to look similar.

use crate::domain::subject::{ActionKind, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-unique id handed out for optimistic entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(u64);

impl LocalId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

/// Identity of an entity, either still local or assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityId {
    /// Placeholder id for an entity the server has not confirmed.
    Temporary(LocalId),
    /// Authoritative id returned by the server.
    Persisted(String),
}

impl EntityId {
    #[must_use]
    pub fn persisted(id: impl Into<String>) -> Self {
        Self::Persisted(id.into())
    }

    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Server id, if this entity has one.
    #[must_use]
    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::Persisted(id) => Some(id),
            Self::Temporary(_) => None,
        }
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temporary(local) => local.fmt(f),
            Self::Persisted(id) => f.write_str(id),
        }
    }
}

/// Lifecycle of a locally created entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    /// Inserted locally, request not yet answered.
    Pending,
    /// Replaced by the server entity.
    Confirmed,
    /// Request failed. Failed entities are removed from the store, so this
    /// status is only observed on detached copies.
    Failed,
}

/// A comment, reply or chat message.
///
/// Only one level of nesting is modelled: top-level comments carry `replies`,
/// and replies keep their own `replies` empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: EntityId,
    pub author: SubjectId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub status: MutationStatus,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Creates a pending placeholder for text the user just submitted.
    #[must_use]
    pub fn optimistic(local_id: LocalId, author: SubjectId, text: String) -> Self {
        Self {
            id: EntityId::Temporary(local_id),
            author,
            text,
            created_at: Utc::now(),
            status: MutationStatus::Pending,
            replies: Vec::new(),
        }
    }

    /// Creates a confirmed comment as delivered by the server.
    #[must_use]
    pub fn persisted(id: impl Into<String>, author: SubjectId, text: impl Into<String>) -> Self {
        Self {
            id: EntityId::persisted(id),
            author,
            text: text.into(),
            created_at: Utc::now(),
            status: MutationStatus::Confirmed,
            replies: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, MutationStatus::Pending)
    }
}

/// Where a newly created entity goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Appended to the top-level list.
    Root,
    /// Appended to the replies of the given top-level comment.
    Reply {
        /// Parent comment; must be persisted.
        parent: EntityId,
    },
}

/// Boolean interactions that carry a public counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleKind {
    Like,
    Star,
}

impl ToggleKind {
    #[must_use]
    pub const fn action(self) -> ActionKind {
        match self {
            Self::Like => ActionKind::ToggleLike,
            Self::Star => ActionKind::ToggleStar,
        }
    }
}

/// A toggle on one server entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToggleTarget {
    pub kind: ToggleKind,
    pub entity: String,
}

impl ToggleTarget {
    #[must_use]
    pub fn like(entity: impl Into<String>) -> Self {
        Self { kind: ToggleKind::Like, entity: entity.into() }
    }

    #[must_use]
    pub fn star(entity: impl Into<String>) -> Self {
        Self { kind: ToggleKind::Star, entity: entity.into() }
    }
}

/// Current flag and counter for a toggle target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleState {
    pub active: bool,
    pub count: i64,
}

impl ToggleState {
    #[must_use]
    pub const fn new(active: bool, count: i64) -> Self {
        Self { active, count }
    }

    /// Returns the flipped state and the counter delta that was applied.
    #[must_use]
    pub const fn flipped(self) -> (Self, i64) {
        let delta = if self.active { -1 } else { 1 };
        (Self { active: !self.active, count: self.count + delta }, delta)
    }

    /// Undoes a flip that applied `delta`.
    #[must_use]
    pub const fn reverted(self, delta: i64) -> Self {
        Self { active: !self.active, count: self.count - delta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_and_persisted_ids_never_compare_equal() {
        let temp = EntityId::Temporary(LocalId::new(7));
        let server = EntityId::persisted("local-7");
        assert_ne!(temp, server);
        assert_eq!(temp.to_string(), server.to_string());
        assert_eq!(server.server_id(), Some("local-7"));
        assert_eq!(temp.server_id(), None);
    }

    #[test]
    fn flip_then_revert_restores_state() {
        let initial = ToggleState::new(false, 10);
        let (flipped, delta) = initial.flipped();
        assert_eq!(flipped, ToggleState::new(true, 11));
        assert_eq!(flipped.reverted(delta), initial);

        let (off, delta) = flipped.flipped();
        assert_eq!(off, ToggleState::new(false, 10));
        assert_eq!(delta, -1);
    }
}
