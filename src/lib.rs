// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collab-Notes: collaborative note-taking backend.
//!
//! This crate provides the HTTP API for authenticating users, creating notes,
//! sharing them with collaborators and autosaving edits from the editor.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod sanitize;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::NoteStore;
use services::{AccessResolver, EditSessions, IdentityProvider, NoteRepository, SystemClock};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    pub access: AccessResolver,
    pub notes: NoteRepository,
    pub sessions: Arc<EditSessions>,
}

impl AppState {
    /// Wire the services on top of a note store and an identity provider.
    pub fn new(
        config: Config,
        store: Arc<dyn NoteStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let notes = NoteRepository::new(store.clone(), Arc::new(SystemClock::new()));
        let access = AccessResolver::new(store);
        let sessions = Arc::new(EditSessions::new(
            notes.clone(),
            config.autosave_debounce,
            config.session_idle_ttl,
        ));

        Self {
            config,
            identity,
            access,
            notes,
            sessions,
        }
    }
}
