// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Collaborator grants: many-to-many edges between notes and non-owner users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Grant of read/write access on a note to a non-owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorGrant {
    /// Deterministic key, see [`CollaboratorGrant::key`]
    pub id: String,
    pub note_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl CollaboratorGrant {
    pub fn new(note_id: Uuid, user_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Self::key(note_id, user_id),
            note_id,
            user_id,
            created_at,
        }
    }

    /// One key per (note, user) pair, so the store rejects duplicates.
    pub fn key(note_id: Uuid, user_id: Uuid) -> String {
        format!("{}_{}", note_id, user_id)
    }
}

/// Result of adding a collaborator. Repeated adds are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum GrantOutcome {
    /// A new grant was stored.
    Added,
    /// The user already held a grant; nothing changed.
    AlreadyCollaborator,
    /// The email belongs to the owner; owners are never stored as grants.
    IsOwner,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_key_is_deterministic() {
        let note_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let a = CollaboratorGrant::new(note_id, user_id, Utc::now());
        let b = CollaboratorGrant::new(note_id, user_id, Utc::now());
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, CollaboratorGrant::key(user_id, note_id));
    }
}
