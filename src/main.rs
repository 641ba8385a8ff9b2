// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collab-Notes API Server
//!
//! Serves authentication, note sharing and debounced autosave for a
//! collaborative rich-text editor.

use collab_notes::{
    config::{Config, StoreKind},
    db::{FirestoreDb, MemoryDb, NoteStore},
    services::{AuthApiClient, EditSessions},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, store = ?config.note_store, "Starting Collab-Notes API");

    let store: Arc<dyn NoteStore> = match config.note_store {
        StoreKind::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            tracing::info!(project = %config.gcp_project_id, "Firestore connected");
            Arc::new(db)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory note store; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    let identity = Arc::new(AuthApiClient::new(
        &config.auth_api_url,
        &config.auth_api_key,
    ));
    tracing::info!(auth_api = %config.auth_api_url, "Identity provider configured");

    // Build shared state
    let port = config.port;
    let state = Arc::new(AppState::new(config, store, identity));

    // Close edit sessions abandoned by clients that never sent DELETE
    let reap_every = (state.sessions.idle_ttl() / 4).max(std::time::Duration::from_secs(1));
    EditSessions::spawn_reaper(state.sessions.clone(), reap_every);

    // Build router
    let app = collab_notes::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("collab_notes=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
