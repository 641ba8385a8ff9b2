// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Default quiet period before an edit session writes its snapshot.
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 1000;

/// Default time an edit session may sit without activity before it is closed.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

/// Which note store backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Google Firestore (production)
    Firestore,
    /// In-process store (local development, tests)
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreKind::Firestore),
            "memory" => Ok(StoreKind::Memory),
            _ => Err(ConfigError::Invalid("NOTE_STORE")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL (allowed CORS origin)
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Note store backend
    pub note_store: StoreKind,
    /// Base URL of the identity provider's auth API
    pub auth_api_url: String,
    /// Public API key sent to the identity provider
    pub auth_api_key: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Quiet period after the last edit before autosave fires
    pub autosave_debounce: Duration,
    /// Edit sessions with no activity for this long are closed
    pub session_idle_ttl: Duration,
}

impl Config {
    /// Config for tests: in-memory store and fixed keys.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            note_store: StoreKind::Memory,
            auth_api_url: "http://localhost:9999".to_string(),
            auth_api_key: "test_api_key".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            autosave_debounce: Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS),
            session_idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let note_store = match env::var("NOTE_STORE") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreKind::Firestore,
        };

        let autosave_ms = match env::var("AUTOSAVE_DEBOUNCE_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("AUTOSAVE_DEBOUNCE_MS"))?,
            Err(_) => DEFAULT_AUTOSAVE_DEBOUNCE_MS,
        };

        let idle_secs = match env::var("EDIT_SESSION_IDLE_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid("EDIT_SESSION_IDLE_SECS"))?,
            Err(_) => DEFAULT_SESSION_IDLE_SECS,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            note_store,
            auth_api_url: env::var("AUTH_API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("AUTH_API_URL"))?,
            auth_api_key: env::var("AUTH_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH_API_KEY"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            autosave_debounce: Duration::from_millis(autosave_ms),
            session_idle_ttl: Duration::from_secs(idle_secs),
        })
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
