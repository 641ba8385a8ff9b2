// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relationship-based access control for notes.
//!
//! A user's role on a note is derived from two facts only: whether they own
//! it, and whether a collaborator grant exists for them. Callers must treat
//! [`AccessRole::NoAccess`] identically whether the note is missing or merely
//! not shared with the user.

use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

use crate::db::NoteStore;
use crate::error::AppError;
use crate::models::Note;

/// A user's relationship to a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum AccessRole {
    Owner,
    Collaborator,
    NoAccess,
}

/// Actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Read the note and edit its content.
    EditContent,
    /// Change the title.
    Rename,
    /// Add collaborators.
    ManageCollaborators,
}

impl AccessRole {
    pub fn allows(self, permission: Permission) -> bool {
        match (self, permission) {
            (AccessRole::Owner, _) => true,
            (AccessRole::Collaborator, Permission::EditContent) => true,
            _ => false,
        }
    }

    pub fn is_owner(self) -> bool {
        self == AccessRole::Owner
    }
}

/// Resolves a user's role on a note against the note store.
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn NoteStore>,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    /// Determine the user's role on a note. Never errors on "not found".
    pub async fn resolve_access(&self, user_id: Uuid, note_id: Uuid) -> Result<AccessRole, AppError> {
        Ok(self.load(user_id, note_id).await?.1)
    }

    /// Resolve the role and return the note along with it, so callers do not
    /// fetch the note twice.
    pub async fn load(
        &self,
        user_id: Uuid,
        note_id: Uuid,
    ) -> Result<(Option<Note>, AccessRole), AppError> {
        let Some(note) = self.store.get_note(note_id).await? else {
            return Ok((None, AccessRole::NoAccess));
        };

        if note.user_id == user_id {
            return Ok((Some(note), AccessRole::Owner));
        }

        let role = match self.store.get_grant(note_id, user_id).await? {
            Some(_) => AccessRole::Collaborator,
            None => AccessRole::NoAccess,
        };
        Ok((Some(note), role))
    }

    /// Load a note the user may act on.
    ///
    /// No access yields `NotFound` (indistinguishable from a missing note);
    /// access without the required permission yields `Forbidden`.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        note_id: Uuid,
        permission: Permission,
    ) -> Result<(Note, AccessRole), AppError> {
        let (note, role) = self.load(user_id, note_id).await?;

        let note = match (note, role) {
            (Some(note), role) if role != AccessRole::NoAccess => note,
            _ => {
                tracing::debug!(%user_id, %note_id, "Note access denied");
                return Err(AppError::NotFound(format!("Note {}", note_id)));
            }
        };

        if !role.allows(permission) {
            tracing::warn!(%user_id, %note_id, ?role, ?permission, "Permission denied");
            return Err(AppError::Forbidden(format!(
                "{:?} is reserved for the note owner",
                permission
            )));
        }

        Ok((note, role))
    }
}
