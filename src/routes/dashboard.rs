// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard view: the user's own notes and the notes shared with them.

use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{OwnedNote, Profile, SharedNote};
use crate::AppState;

/// Dashboard routes (session gate applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard", get(dashboard))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardResponse {
    pub profile: Option<Profile>,
    /// Most recently updated first.
    pub owned_notes: Vec<OwnedNote>,
    /// Most recently updated first.
    pub shared_notes: Vec<SharedNote>,
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DashboardResponse>> {
    let (profile, owned_notes, shared_notes) = tokio::try_join!(
        state.notes.get_profile(user.user_id),
        state.notes.list_owned_notes_with_collaborators(user.user_id),
        state.notes.list_collaborative_notes(user.user_id),
    )?;

    tracing::debug!(
        user_id = %user.user_id,
        owned = owned_notes.len(),
        shared = shared_notes.len(),
        "Dashboard loaded"
    );

    Ok(Json(DashboardResponse {
        profile,
        owned_notes,
        shared_notes,
    }))
}
