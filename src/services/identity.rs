// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider client.
//!
//! Handles:
//! - Email/password sign-up and sign-in
//! - External provider redirect flow (PKCE authorize URL + code exchange)
//! - Sign-out
//!
//! Password hashing and token issuance belong to the provider. This service
//! only needs the provider's view of the user to mint its own session.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::IdentityUser;

/// Session returned by the identity provider after authentication.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    /// Provider access token, needed for sign-out.
    pub access_token: String,
    pub user: IdentityUser,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<ProviderSession, AppError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, AppError>;

    /// URL that starts the external provider flow. `code_challenge` is the
    /// S256 PKCE challenge for the verifier kept by the caller.
    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String;

    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderSession, AppError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;
}

// ─── PKCE ────────────────────────────────────────────────────────

/// Generate a random PKCE code verifier (43 URL-safe characters).
pub fn generate_code_verifier() -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// S256 challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

// ─── GoTrue-style REST client ────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthUserPayload {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    access_token: Option<String>,
    user: Option<AuthUserPayload>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(alias = "error_description", alias = "msg", alias = "message")]
    error: Option<String>,
}

impl TryFrom<AuthUserPayload> for IdentityUser {
    type Error = AppError;

    fn try_from(user: AuthUserPayload) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Identity(format!("Malformed user id: {:?}", user.id)))?;
        let email = user
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Identity("User has no email".to_string()))?;
        let meta = user.user_metadata;

        Ok(IdentityUser {
            id,
            email,
            full_name: meta.full_name.or(meta.name),
            avatar_url: meta.avatar_url.or(meta.picture),
        })
    }
}

/// Client for a GoTrue-compatible auth API (`/auth/v1/...`).
#[derive(Clone)]
pub struct AuthApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    async fn post_session(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<ProviderSession, AppError> {
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Identity(e.to_string()))?;

        let payload: SessionPayload = self.check_response_json(response).await?;

        let access_token = payload.access_token.ok_or_else(|| {
            AppError::AuthenticationFailed("Account requires email confirmation".to_string())
        })?;
        let user = payload
            .user
            .ok_or_else(|| AppError::Identity("Session without user".to_string()))?
            .try_into()?;

        Ok(ProviderSession { access_token, user })
    }

    /// Check response and parse JSON body.
    ///
    /// Client errors mean the credentials or code were rejected; anything
    /// else is a provider failure.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AppError::Identity(format!("Unexpected response shape: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorPayload>(&body)
            .ok()
            .and_then(|p| p.error)
            .unwrap_or_else(|| format!("HTTP {}", status));

        if status.is_client_error() && status.as_u16() != 429 {
            tracing::info!(status = status.as_u16(), "Identity provider rejected request");
            return Err(AppError::AuthenticationFailed(message));
        }

        Err(AppError::Identity(format!("HTTP {}: {}", status, message)))
    }
}

#[async_trait]
impl IdentityProvider for AuthApiClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<ProviderSession, AppError> {
        let url = format!("{}/signup", self.base_url);
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });
        self.post_session(&url, body).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, AppError> {
        let url = format!("{}/token?grant_type=password", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });
        self.post_session(&url, body).await
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "{}/authorize?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            self.base_url,
            urlencoding::encode(provider),
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge),
        )
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderSession, AppError> {
        let url = format!("{}/token?grant_type=pkce", self.base_url);
        let body = serde_json::json!({ "auth_code": code, "code_verifier": code_verifier });
        self.post_session(&url, body).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Identity(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(AppError::Identity(format!(
            "Sign-out failed: HTTP {}",
            response.status()
        )))
    }
}
