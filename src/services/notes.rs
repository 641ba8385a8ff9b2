// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Note repository: notes, collaborator grants and profiles.
//!
//! Sits on top of a [`NoteStore`] and owns the rules the store does not
//! know about: the new-note template, content sanitization, server-side
//! timestamps, recency ordering and the add-collaborator policy.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::NoteStore;
use crate::error::AppError;
use crate::models::profile::normalize_email;
use crate::models::{
    CollaboratorGrant, GrantOutcome, IdentityUser, NewNote, Note, NotePatch, OwnedNote, Profile,
    SharedNote,
};
use crate::sanitize::{escape_html, sanitize_html};
use crate::services::clock::Clock;
use crate::time_utils::format_long_date;

/// Longest accepted note title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Destination for autosave writes.
///
/// This is the seam where a merge layer (OT/CRDT) would sit; today writes are
/// last-write-wins.
#[async_trait]
pub trait NoteWriter: Send + Sync {
    async fn write(&self, note_id: Uuid, patch: NotePatch) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct NoteRepository {
    store: Arc<dyn NoteStore>,
    clock: Arc<dyn Clock>,
}

/// Validate and trim a title.
pub fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::BadRequest(format!(
            "Title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

/// Initial content of a new note: the title as a heading and the creation date.
pub fn note_template(title: &str, created: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "<h1>{}</h1><p>{}</p>",
        escape_html(title),
        format_long_date(created)
    )
}

impl NoteRepository {
    pub fn new(store: Arc<dyn NoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // ─── Notes ───────────────────────────────────────────────────

    /// Create a note owned by `owner_id`.
    pub async fn create_note(&self, owner_id: Uuid, title: &str) -> Result<Note, AppError> {
        let title = validate_title(title)?;
        let now = self.clock.now();

        let note = self
            .store
            .insert_note(&NewNote {
                content: note_template(&title, now),
                title,
                user_id: owner_id,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(note_id = %note.id, owner_id = %owner_id, "Note created");
        Ok(note)
    }

    pub async fn get_note(&self, note_id: Uuid) -> Result<Option<Note>, AppError> {
        self.store.get_note(note_id).await
    }

    /// Apply a partial update and refresh `updated_at` in the same write.
    pub async fn update_note(&self, note_id: Uuid, patch: NotePatch) -> Result<(), AppError> {
        if patch.is_empty() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }

        let patch = NotePatch {
            title: patch.title.as_deref().map(validate_title).transpose()?,
            content: patch.content.as_deref().map(sanitize_html),
        };

        let updated_at = self.clock.now();
        if !self.store.update_note(note_id, &patch, updated_at).await? {
            return Err(AppError::NotFound(format!("Note {}", note_id)));
        }

        tracing::debug!(
            note_id = %note_id,
            title = patch.title.is_some(),
            content = patch.content.is_some(),
            "Note updated"
        );
        Ok(())
    }

    /// Notes owned by the user, most recently updated first.
    pub async fn list_owned_notes(&self, user_id: Uuid) -> Result<Vec<Note>, AppError> {
        self.store.list_notes_by_owner(user_id).await
    }

    /// Owned notes, each with the profiles of its collaborators.
    pub async fn list_owned_notes_with_collaborators(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OwnedNote>, AppError> {
        let notes = self.list_owned_notes(user_id).await?;

        try_join_all(notes.into_iter().map(|note| async move {
            let collaborators = self.collaborator_profiles(note.id).await?;
            Ok::<_, AppError>(OwnedNote {
                note,
                collaborators,
            })
        }))
        .await
    }

    /// Notes shared with the user, each with its owner's profile, most
    /// recently updated first.
    pub async fn list_collaborative_notes(&self, user_id: Uuid) -> Result<Vec<SharedNote>, AppError> {
        let grants = self.store.list_grants_for_user(user_id).await?;

        let notes = try_join_all(grants.iter().map(|g| self.store.get_note(g.note_id))).await?;
        // A grant can outlive its note; skip dangling edges.
        let notes: Vec<Note> = notes.into_iter().flatten().collect();

        let mut owners: HashMap<Uuid, Option<Profile>> = HashMap::new();
        for note in &notes {
            if !owners.contains_key(&note.user_id) {
                let profile = self.store.get_profile(note.user_id).await?;
                owners.insert(note.user_id, profile);
            }
        }

        let mut shared: Vec<SharedNote> = notes
            .into_iter()
            .map(|note| SharedNote {
                owner: owners.get(&note.user_id).cloned().flatten(),
                note,
            })
            .collect();
        shared.sort_by(|a, b| b.note.updated_at.cmp(&a.note.updated_at));
        Ok(shared)
    }

    // ─── Collaborators ───────────────────────────────────────────

    /// Share a note with the user registered under `email`.
    ///
    /// Does not create users: an unknown email is `ProfileNotFound`. Adding
    /// an existing collaborator, or the owner, changes nothing.
    pub async fn add_collaborator(&self, note_id: Uuid, email: &str) -> Result<GrantOutcome, AppError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AppError::BadRequest("Email must not be empty".to_string()));
        }

        let note = self
            .store
            .get_note(note_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Note {}", note_id)))?;

        let profile = self
            .store
            .find_profile_by_email(&email)
            .await?
            .ok_or_else(|| AppError::ProfileNotFound(email.clone()))?;

        if profile.id == note.user_id {
            return Ok(GrantOutcome::IsOwner);
        }

        let grant = CollaboratorGrant::new(note_id, profile.id, self.clock.now());
        let outcome = if self.store.insert_grant(&grant).await? {
            GrantOutcome::Added
        } else {
            GrantOutcome::AlreadyCollaborator
        };

        tracing::info!(
            note_id = %note_id,
            collaborator_id = %profile.id,
            ?outcome,
            "Collaborator grant processed"
        );
        Ok(outcome)
    }

    /// Everyone with access: the owner first, then collaborators in grant order.
    pub async fn list_collaborators(&self, note: &Note) -> Result<Vec<Profile>, AppError> {
        let mut people = Vec::new();
        if let Some(owner) = self.store.get_profile(note.user_id).await? {
            people.push(owner);
        }
        people.extend(self.collaborator_profiles(note.id).await?);
        Ok(people)
    }

    async fn collaborator_profiles(&self, note_id: Uuid) -> Result<Vec<Profile>, AppError> {
        let grants = self.store.list_grants_for_note(note_id).await?;
        let profiles = try_join_all(grants.iter().map(|g| self.store.get_profile(g.user_id))).await?;
        Ok(profiles.into_iter().flatten().collect())
    }

    // ─── Profiles ────────────────────────────────────────────────

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        self.store.get_profile(user_id).await
    }

    /// Return the user's profile, creating it on first sight.
    pub async fn ensure_profile(&self, user: &IdentityUser) -> Result<Profile, AppError> {
        if let Some(profile) = self.store.get_profile(user.id).await? {
            return Ok(profile);
        }

        let now = self.clock.now();
        let profile = Profile {
            id: user.id,
            email: normalize_email(&user.email),
            full_name: user.full_name.clone(),
            avatar_url: user.avatar_url.clone(),
            created_at: now,
            updated_at: now,
        };

        if self.store.insert_profile(&profile).await? {
            tracing::info!(user_id = %user.id, "Profile created");
            return Ok(profile);
        }

        // Lost a race with a concurrent login; use the stored row.
        self.store
            .get_profile(user.id)
            .await?
            .ok_or_else(|| AppError::Database(format!("Profile {} vanished after insert", user.id)))
    }
}

#[async_trait]
impl NoteWriter for NoteRepository {
    async fn write(&self, note_id: Uuid, patch: NotePatch) -> Result<(), AppError> {
        self.update_note(note_id, patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::services::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn repo() -> (NoteRepository, Arc<MemoryDb>, Arc<ManualClock>) {
        let db = Arc::new(MemoryDb::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
        ));
        (NoteRepository::new(db.clone(), clock.clone()), db, clock)
    }

    #[test]
    fn test_template_escapes_title() {
        let date = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        assert_eq!(
            note_template("A <b> & C", date),
            "<h1>A &lt;b&gt; &amp; C</h1><p>October 18, 2026</p>"
        );
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Plan ").unwrap(), "Plan");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_CHARS + 1)).is_err());
    }

    #[tokio::test]
    async fn test_update_sanitizes_content() {
        let (repo, _, clock) = repo();
        let note = repo.create_note(Uuid::new_v4(), "Draft").await.unwrap();
        clock.advance(chrono::Duration::seconds(1));

        repo.update_note(
            note.id,
            NotePatch {
                title: None,
                content: Some("<p>ok</p><script>bad()</script>".to_string()),
            },
        )
        .await
        .unwrap();

        let stored = repo.get_note(note.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "<p>ok</p>");
        assert_eq!(stored.title, "Draft");
    }

    #[tokio::test]
    async fn test_update_missing_note_is_not_found() {
        let (repo, _, _) = repo();
        let err = repo
            .update_note(
                Uuid::new_v4(),
                NotePatch {
                    title: Some("x".to_string()),
                    content: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_owner_as_collaborator_is_noop() {
        let (repo, db, _) = repo();
        let owner = IdentityUser {
            id: Uuid::new_v4(),
            email: "Owner@Example.com".to_string(),
            full_name: None,
            avatar_url: None,
        };
        repo.ensure_profile(&owner).await.unwrap();
        let note = repo.create_note(owner.id, "Mine").await.unwrap();

        let outcome = repo
            .add_collaborator(note.id, "owner@example.com")
            .await
            .unwrap();

        assert_eq!(outcome, GrantOutcome::IsOwner);
        assert_eq!(db.grant_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_profile_is_idempotent() {
        let (repo, _, clock) = repo();
        let user = IdentityUser {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            full_name: Some("Ada".to_string()),
            avatar_url: None,
        };

        let first = repo.ensure_profile(&user).await.unwrap();
        clock.advance(chrono::Duration::minutes(5));
        let second = repo.ensure_profile(&user).await.unwrap();

        assert_eq!(first, second);
    }
}
