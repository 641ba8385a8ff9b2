// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side editing sessions.
//!
//! Opening a note in the editor creates a session that owns one
//! [`AutosaveController`]. The client streams its edits to the session and
//! closes it when the editor view goes away, which cancels any save still
//! waiting on the debounce timer.
//!
//! A user has at most one session per note: opening the same note again
//! returns the live session. Sessions left open by a client that went away
//! are closed once they have been idle for the configured TTL, either by the
//! periodic [`EditSessions::reap_idle`] sweep or when the next session opens.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Note;
use crate::services::access::{AccessRole, Permission};
use crate::services::autosave::{AutosaveController, Draft, SaveState};
use crate::services::notes::{validate_title, NoteRepository};

/// One open editor.
pub struct EditSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: AccessRole,
    controller: AutosaveController,
    last_active: Instant,
}

impl EditSession {
    pub fn note_id(&self) -> Uuid {
        self.controller.note_id()
    }

    pub fn state(&self) -> SaveState {
        self.controller.state()
    }

    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_active) >= ttl
    }
}

/// An edit pushed by the client. Omitted fields did not change.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct EditEvent {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Session snapshot returned to clients.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub note_id: Uuid,
    pub role: AccessRole,
    pub state: SaveState,
}

/// Registry of open sessions.
pub struct EditSessions {
    sessions: DashMap<Uuid, EditSession>,
    notes: NoteRepository,
    debounce: Duration,
    idle_ttl: Duration,
}

impl EditSessions {
    pub fn new(notes: NoteRepository, debounce: Duration, idle_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            notes,
            debounce,
            idle_ttl,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Open a session on a note the caller has already been authorized for.
    ///
    /// Returns the caller's live session on the note if there is one.
    pub fn open(&self, user_id: Uuid, note: &Note, role: AccessRole) -> SessionStatus {
        // Dropping a controller cancels its pending timer.
        drop(self.take_idle());

        if let Some(mut existing) = self
            .sessions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.note_id() == note.id)
        {
            existing.last_active = Instant::now();
            existing.role = role;
            tracing::debug!(
                session_id = %existing.id,
                note_id = %note.id,
                user_id = %user_id,
                "Reusing edit session"
            );
            return status_of(&existing);
        }

        let controller = AutosaveController::spawn(
            note.id,
            Draft {
                title: note.title.clone(),
                content: note.content.clone(),
            },
            Arc::new(self.notes.clone()),
            self.debounce,
        );

        let session = EditSession {
            id: Uuid::new_v4(),
            user_id,
            role,
            controller,
            last_active: Instant::now(),
        };
        let status = status_of(&session);
        tracing::info!(
            session_id = %session.id,
            note_id = %note.id,
            user_id = %user_id,
            ?role,
            "Edit session opened"
        );
        self.sessions.insert(session.id, session);
        status
    }

    /// Status of a session owned by `user_id`.
    pub fn status(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionStatus, AppError> {
        let session = self.lookup(user_id, session_id)?;
        Ok(status_of(&session))
    }

    /// Feed an edit into the session's autosave.
    pub fn edit(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        event: EditEvent,
    ) -> Result<SessionStatus, AppError> {
        let session = self.lookup(user_id, session_id)?;

        if event.title.is_none() && event.content.is_none() {
            return Err(AppError::BadRequest("Edit carries no changes".to_string()));
        }
        if let Some(title) = event.title {
            if !session.role.allows(Permission::Rename) {
                return Err(AppError::Forbidden(
                    "Only the owner can rename a note".to_string(),
                ));
            }
            validate_title(&title)?;
            session.controller.edit_title(title);
        }
        if let Some(content) = event.content {
            session.controller.edit_content(content);
        }

        Ok(status_of(&session))
    }

    /// Save the current snapshot right away (title blur / confirm).
    pub fn commit_title(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionStatus, AppError> {
        let session = self.lookup(user_id, session_id)?;
        if !session.role.allows(Permission::Rename) {
            return Err(AppError::Forbidden(
                "Only the owner can rename a note".to_string(),
            ));
        }
        session.controller.commit_title();
        Ok(status_of(&session))
    }

    /// Close a session, cancelling any save still waiting on its timer.
    pub async fn close(&self, user_id: Uuid, session_id: Uuid) -> Result<(), AppError> {
        // Check ownership before removing.
        drop(self.lookup(user_id, session_id)?);

        let Some((_, session)) = self.sessions.remove(&session_id) else {
            return Err(AppError::NotFound(format!("Session {}", session_id)));
        };
        let note_id = session.note_id();
        session.controller.close().await;

        tracing::info!(session_id = %session_id, note_id = %note_id, "Edit session closed");
        Ok(())
    }

    /// Close every session idle for longer than the TTL. Returns how many
    /// were closed.
    pub async fn reap_idle(&self) -> usize {
        let idle = self.take_idle();
        let count = idle.len();
        for session in idle {
            let (session_id, note_id) = (session.id, session.note_id());
            session.controller.close().await;
            tracing::info!(session_id = %session_id, note_id = %note_id, "Idle edit session closed");
        }
        count
    }

    /// Run [`reap_idle`](Self::reap_idle) every `period` until the task is aborted.
    pub fn spawn_reaper(sessions: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let closed = sessions.reap_idle().await;
                if closed > 0 {
                    tracing::debug!(closed, open = sessions.len(), "Reaped idle edit sessions");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove and return sessions past the idle TTL.
    fn take_idle(&self) -> Vec<EditSession> {
        let now = Instant::now();
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|s| s.is_idle(now, self.idle_ttl))
            .map(|s| s.id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| {
                self.sessions
                    .remove_if(&id, |_, s| s.is_idle(now, self.idle_ttl))
                    .map(|(_, s)| s)
            })
            .collect()
    }

    /// Find a live session owned by `user_id` and mark it active.
    fn lookup(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, EditSession>, AppError> {
        match self.sessions.get_mut(&session_id) {
            Some(mut session)
                if session.user_id == user_id && !session.is_idle(Instant::now(), self.idle_ttl) =>
            {
                session.last_active = Instant::now();
                Ok(session)
            }
            _ => Err(AppError::NotFound(format!("Session {}", session_id))),
        }
    }
}

fn status_of(session: &EditSession) -> SessionStatus {
    SessionStatus {
        session_id: session.id,
        note_id: session.note_id(),
        role: session.role,
        state: session.state(),
    }
}
