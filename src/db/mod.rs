// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the note store seam and its backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CollaboratorGrant, NewNote, Note, NotePatch, Profile};

/// Collection names as constants.
pub mod collections {
    pub const NOTES: &str = "notes";
    pub const PROFILES: &str = "profiles";
    pub const NOTE_COLLABORATORS: &str = "note_collaborators";
}

/// Row-level primitives over the `notes`, `profiles` and
/// `note_collaborators` relations.
///
/// Lookups that find nothing return `Ok(None)`; only transport or backend
/// failures are errors.
#[async_trait]
pub trait NoteStore: Send + Sync {
    // ─── Notes ───────────────────────────────────────────────────

    async fn get_note(&self, note_id: Uuid) -> Result<Option<Note>, AppError>;

    /// Insert a note and return it with its assigned ID.
    async fn insert_note(&self, note: &NewNote) -> Result<Note, AppError>;

    /// Apply a partial update. Returns `false` if the note does not exist.
    async fn update_note(
        &self,
        note_id: Uuid,
        patch: &NotePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Notes owned by a user, most recently updated first.
    async fn list_notes_by_owner(&self, user_id: Uuid) -> Result<Vec<Note>, AppError>;

    // ─── Profiles ────────────────────────────────────────────────

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError>;

    /// Look up a profile by normalized email.
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError>;

    /// Insert a profile. Returns `false` if one already exists for the ID.
    async fn insert_profile(&self, profile: &Profile) -> Result<bool, AppError>;

    // ─── Collaborator Grants ─────────────────────────────────────

    async fn get_grant(
        &self,
        note_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CollaboratorGrant>, AppError>;

    /// Insert a grant. Returns `false` if the (note, user) pair already has one.
    async fn insert_grant(&self, grant: &CollaboratorGrant) -> Result<bool, AppError>;

    async fn list_grants_for_note(&self, note_id: Uuid)
        -> Result<Vec<CollaboratorGrant>, AppError>;

    async fn list_grants_for_user(&self, user_id: Uuid)
        -> Result<Vec<CollaboratorGrant>, AppError>;
}
