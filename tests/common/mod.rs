// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use collab_notes::config::Config;
use collab_notes::db::{FirestoreDb, MemoryDb};
use collab_notes::error::AppError;
use collab_notes::middleware::auth::create_jwt;
use collab_notes::models::{IdentityUser, Profile};
use collab_notes::routes::create_router;
use collab_notes::services::identity::code_challenge;
use collab_notes::services::{IdentityProvider, ProviderSession};
use collab_notes::AppState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Authorization code the stub provider accepts.
#[allow(dead_code)]
pub const GOOD_CODE: &str = "good-code";

/// Email of the user behind [`GOOD_CODE`].
#[allow(dead_code)]
pub const PROVIDER_USER_EMAIL: &str = "oauth.user@example.com";

/// In-process identity provider.
#[derive(Default)]
pub struct StubIdentity {
    accounts: DashMap<String, (String, IdentityUser)>,
    challenges: Mutex<Vec<String>>,
    provider_user_id: Mutex<Option<Uuid>>,
    pub sign_outs: AtomicUsize,
}

impl StubIdentity {
    #[allow(dead_code)]
    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn session_for(user: IdentityUser) -> ProviderSession {
        ProviderSession {
            access_token: format!("provider-token-{}", user.id),
            user,
        }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<ProviderSession, AppError> {
        let key = email.to_lowercase();
        if self.accounts.contains_key(&key) {
            return Err(AppError::AuthenticationFailed(
                "User already registered".to_string(),
            ));
        }
        let user = IdentityUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: Some(full_name.to_string()),
            avatar_url: None,
        };
        self.accounts
            .insert(key, (password.to_string(), user.clone()));
        Ok(Self::session_for(user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, AppError> {
        match self.accounts.get(&email.to_lowercase()) {
            Some(entry) if entry.0 == password => Ok(Self::session_for(entry.1.clone())),
            _ => Err(AppError::AuthenticationFailed(
                "Invalid login credentials".to_string(),
            )),
        }
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        self.challenges
            .lock()
            .unwrap()
            .push(code_challenge.to_string());
        format!(
            "https://idp.test/authorize?provider={}&redirect_to={}&code_challenge={}",
            provider,
            urlencoding::encode(redirect_to),
            code_challenge
        )
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderSession, AppError> {
        let challenge = code_challenge(code_verifier);
        let known = self.challenges.lock().unwrap().contains(&challenge);
        if code != GOOD_CODE || !known {
            return Err(AppError::AuthenticationFailed("Invalid code".to_string()));
        }

        let id = *self
            .provider_user_id
            .lock()
            .unwrap()
            .get_or_insert_with(Uuid::new_v4);
        Ok(Self::session_for(IdentityUser {
            id,
            email: PROVIDER_USER_EMAIL.to_string(),
            full_name: Some("OAuth User".to_string()),
            avatar_url: Some("https://img.test/oauth.png".to_string()),
        }))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AppError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Test application backed by the in-memory store and the stub provider.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub identity: Arc<StubIdentity>,
}

/// Create a test app with offline dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_frontend_url(frontend_url: &str) -> TestApp {
    let mut config = Config::test_default();
    config.frontend_url = frontend_url.to_string();
    create_test_app_with_config(config)
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let identity = Arc::new(StubIdentity::default());
    let state = Arc::new(AppState::new(
        config,
        Arc::new(MemoryDb::new()),
        identity.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        identity,
    }
}

/// Register a profile directly (no provider round trip).
#[allow(dead_code)]
pub async fn seed_user(state: &AppState, email: &str, full_name: &str) -> Profile {
    state
        .notes
        .ensure_profile(&IdentityUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: Some(full_name.to_string()),
            avatar_url: None,
        })
        .await
        .expect("Failed to seed profile")
}

/// `Authorization` header value for a user.
#[allow(dead_code)]
pub fn bearer(state: &AppState, user: &Profile) -> String {
    let token = create_jwt(user.id, &user.email, &state.config.jwt_signing_key)
        .expect("Failed to create JWT");
    format!("Bearer {}", token)
}

/// `Cookie` header value carrying a session for a user.
#[allow(dead_code)]
pub fn session_cookie(state: &AppState, user: &Profile) -> String {
    let token = create_jwt(user.id, &user.email, &state.config.jwt_signing_key)
        .expect("Failed to create JWT");
    format!("collab_session={}", token)
}

/// Build a JSON request, optionally authenticated.
#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a body-less request, optionally authenticated.
#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}
