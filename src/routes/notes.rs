// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Note routes: the editor view and the note/collaborator API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{GrantOutcome, Note, NotePatch, Profile};
use crate::services::sessions::SessionStatus;
use crate::services::{AccessRole, Permission};
use crate::AppState;

/// Editor view (session gate applied in routes/mod.rs).
pub fn view_routes() -> Router<Arc<AppState>> {
    Router::new().route("/notes/{id}", get(editor_view))
}

/// Note API (auth middleware applied in routes/mod.rs).
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notes", post(create_note))
        .route("/api/notes/{id}", get(get_note).patch(update_note))
        .route(
            "/api/notes/{id}/collaborators",
            get(list_collaborators).post(add_collaborator),
        )
        .route("/api/notes/{id}/sessions", post(open_session))
}

/// Parse a note id from the path. Malformed ids look like missing notes.
fn parse_note_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("Note {}", raw)))
}

// ─── Editor view ─────────────────────────────────────────────

/// Everything the editor needs to render a note.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EditorView {
    pub note: Note,
    pub role: AccessRole,
    pub can_rename: bool,
    pub can_share: bool,
    /// Owner first, then collaborators.
    pub collaborators: Vec<Profile>,
    pub autosave_debounce_ms: u64,
}

async fn editor_view(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
) -> Result<Response> {
    let Ok(note_id) = parse_note_id(&raw_id) else {
        return Ok(Redirect::to("/dashboard").into_response());
    };

    let (note, role) = match state
        .access
        .authorize(user.user_id, note_id, Permission::EditContent)
        .await
    {
        Ok(found) => found,
        Err(AppError::NotFound(_)) => {
            tracing::info!(note_id = %note_id, user_id = %user.user_id, "No access to note, redirecting");
            return Ok(Redirect::to("/dashboard").into_response());
        }
        Err(e) => return Err(e),
    };

    let collaborators = state.notes.list_collaborators(&note).await?;

    Ok(Json(EditorView {
        note,
        role,
        can_rename: role.allows(Permission::Rename),
        can_share: role.allows(Permission::ManageCollaborators),
        collaborators,
        autosave_debounce_ms: u64::try_from(state.sessions.debounce().as_millis())
            .unwrap_or(u64::MAX),
    })
    .into_response())
}

// ─── Notes ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1))]
    pub title: String,
}

async fn create_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>)> {
    body.validate()?;
    let note = state.notes.create_note(user.user_id, &body.title).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// A note together with the caller's role on it.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NoteResponse {
    #[serde(flatten)]
    pub note: Note,
    pub role: AccessRole,
}

async fn get_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<NoteResponse>> {
    let note_id = parse_note_id(&raw_id)?;
    let (note, role) = state
        .access
        .authorize(user.user_id, note_id, Permission::EditContent)
        .await?;
    Ok(Json(NoteResponse { note, role }))
}

/// Partial update. Renaming needs the owner; content edits any collaborator.
async fn update_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
    Json(patch): Json<NotePatch>,
) -> Result<Json<NoteResponse>> {
    let note_id = parse_note_id(&raw_id)?;
    let permission = if patch.title.is_some() {
        Permission::Rename
    } else {
        Permission::EditContent
    };
    let (_, role) = state
        .access
        .authorize(user.user_id, note_id, permission)
        .await?;

    state.notes.update_note(note_id, patch).await?;

    let note = state
        .notes
        .get_note(note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Note {}", note_id)))?;
    Ok(Json(NoteResponse { note, role }))
}

// ─── Collaborators ───────────────────────────────────────────

async fn list_collaborators(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<Profile>>> {
    let note_id = parse_note_id(&raw_id)?;
    let (note, _) = state
        .access
        .authorize(user.user_id, note_id, Permission::EditContent)
        .await?;
    Ok(Json(state.notes.list_collaborators(&note).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddCollaboratorRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AddCollaboratorResponse {
    pub outcome: GrantOutcome,
    pub collaborators: Vec<Profile>,
}

async fn add_collaborator(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
    Json(body): Json<AddCollaboratorRequest>,
) -> Result<(StatusCode, Json<AddCollaboratorResponse>)> {
    let note_id = parse_note_id(&raw_id)?;
    let (note, _) = state
        .access
        .authorize(user.user_id, note_id, Permission::ManageCollaborators)
        .await?;
    body.validate()?;

    let outcome = state.notes.add_collaborator(note_id, &body.email).await?;
    let collaborators = state.notes.list_collaborators(&note).await?;

    let status = match outcome {
        GrantOutcome::Added => StatusCode::CREATED,
        GrantOutcome::AlreadyCollaborator | GrantOutcome::IsOwner => StatusCode::OK,
    };
    Ok((
        status,
        Json(AddCollaboratorResponse {
            outcome,
            collaborators,
        }),
    ))
}

// ─── Edit sessions ───────────────────────────────────────────

async fn open_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
) -> Result<(StatusCode, Json<SessionStatus>)> {
    let note_id = parse_note_id(&raw_id)?;
    let (note, role) = state
        .access
        .authorize(user.user_id, note_id, Permission::EditContent)
        .await?;

    let status = state.sessions.open(user.user_id, &note, role);
    Ok((StatusCode::CREATED, Json(status)))
}
