// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Edit-session API: push edits, commit titles, close the editor.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::sessions::{EditEvent, SessionStatus};
use crate::AppState;

/// Session routes (auth middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sessions/{sid}", get(session_status).delete(close_session))
        .route("/api/sessions/{sid}/edits", post(push_edit))
        .route("/api/sessions/{sid}/commit-title", post(commit_title))
}

fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("Session {}", raw)))
}

async fn session_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<SessionStatus>> {
    let session_id = parse_session_id(&raw_id)?;
    Ok(Json(state.sessions.status(user.user_id, session_id)?))
}

/// Feed an edit into autosave. The write happens after the debounce period.
async fn push_edit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
    Json(event): Json<EditEvent>,
) -> Result<(StatusCode, Json<SessionStatus>)> {
    let session_id = parse_session_id(&raw_id)?;
    let status = state.sessions.edit(user.user_id, session_id, event)?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// Title blur/confirm: save now instead of waiting for the timer.
async fn commit_title(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
) -> Result<(StatusCode, Json<SessionStatus>)> {
    let session_id = parse_session_id(&raw_id)?;
    let status = state.sessions.commit_title(user.user_id, session_id)?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// Close the editor. A save still waiting on its timer is dropped.
async fn close_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode> {
    let session_id = parse_session_id(&raw_id)?;
    state.sessions.close(user.user_id, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
