// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process note store for local development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::NoteStore;
use crate::error::AppError;
use crate::models::{CollaboratorGrant, NewNote, Note, NotePatch, Profile};

/// Note store backed by concurrent hash maps. Cloning shares the data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    notes: Arc<DashMap<Uuid, Note>>,
    profiles: Arc<DashMap<Uuid, Profile>>,
    grants: Arc<DashMap<String, CollaboratorGrant>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored grants (test helper).
    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }
}

fn sort_recent_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl NoteStore for MemoryDb {
    async fn get_note(&self, note_id: Uuid) -> Result<Option<Note>, AppError> {
        Ok(self.notes.get(&note_id).map(|n| n.value().clone()))
    }

    async fn insert_note(&self, note: &NewNote) -> Result<Note, AppError> {
        let stored = Note {
            id: Uuid::new_v4(),
            title: note.title.clone(),
            content: note.content.clone(),
            user_id: note.user_id,
            created_at: note.created_at,
            updated_at: note.updated_at,
        };
        self.notes.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_note(
        &self,
        note_id: Uuid,
        patch: &NotePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.notes.get_mut(&note_id) {
            Some(mut note) => {
                patch.apply_to(note.value_mut(), updated_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_notes_by_owner(&self, user_id: Uuid) -> Result<Vec<Note>, AppError> {
        let mut notes: Vec<Note> = self
            .notes
            .iter()
            .filter(|n| n.user_id == user_id)
            .map(|n| n.value().clone())
            .collect();
        sort_recent_first(&mut notes);
        Ok(notes)
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(self.profiles.get(&user_id).map(|p| p.value().clone()))
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError> {
        Ok(self
            .profiles
            .iter()
            .find(|p| p.email == email)
            .map(|p| p.value().clone()))
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<bool, AppError> {
        match self.profiles.entry(profile.id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                Ok(true)
            }
        }
    }

    async fn get_grant(
        &self,
        note_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CollaboratorGrant>, AppError> {
        Ok(self
            .grants
            .get(&CollaboratorGrant::key(note_id, user_id))
            .map(|g| g.value().clone()))
    }

    async fn insert_grant(&self, grant: &CollaboratorGrant) -> Result<bool, AppError> {
        match self.grants.entry(grant.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(grant.clone());
                Ok(true)
            }
        }
    }

    async fn list_grants_for_note(
        &self,
        note_id: Uuid,
    ) -> Result<Vec<CollaboratorGrant>, AppError> {
        let mut grants: Vec<CollaboratorGrant> = self
            .grants
            .iter()
            .filter(|g| g.note_id == note_id)
            .map(|g| g.value().clone())
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn list_grants_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<CollaboratorGrant>, AppError> {
        let mut grants: Vec<CollaboratorGrant> = self
            .grants
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| g.value().clone())
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_missing_note_reports_false() {
        let db = MemoryDb::new();
        let patch = NotePatch {
            title: Some("x".to_string()),
            content: None,
        };
        let updated = db
            .update_note(Uuid::new_v4(), &patch, Utc::now())
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_insert_grant_rejects_duplicate_pair() {
        let db = MemoryDb::new();
        let note_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let first = CollaboratorGrant::new(note_id, user_id, Utc::now());
        let second = CollaboratorGrant::new(note_id, user_id, Utc::now());

        assert!(db.insert_grant(&first).await.unwrap());
        assert!(!db.insert_grant(&second).await.unwrap());
        assert_eq!(db.grant_count(), 1);
    }
}
