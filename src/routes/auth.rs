// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes.
//!
//! Email/password and external-provider flows both end the same way: the
//! identity provider vouches for the user, the profile row is created if it
//! is missing, and a session cookie is issued.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::models::Profile;
use crate::services::identity::{code_challenge, generate_code_verifier, ProviderSession};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Cookie holding the identity provider's access token (used for sign-out).
pub const PROVIDER_TOKEN_COOKIE: &str = "collab_provider_token";

/// Cookie holding the signed PKCE verifier between redirect and callback.
pub const PKCE_COOKIE: &str = "collab_pkce";

/// Path the provider redirects back to.
const CALLBACK_PATH: &str = "/auth/callback";

/// How long a provider round trip may take.
const PKCE_MAX_AGE_SECS: u64 = 10 * 60;

const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth", get(auth_view))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/provider/{provider}", get(provider_start))
        .route(CALLBACK_PATH, get(auth_callback))
        .route("/auth/logout", post(logout))
}

// ─── Login view ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AuthViewParams {
    #[serde(default)]
    error: Option<String>,
}

/// Login page view model.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthViewResponse {
    pub error: Option<String>,
}

async fn auth_view(Query(params): Query<AuthViewParams>) -> Json<AuthViewResponse> {
    Json(AuthViewResponse {
        error: params.error.filter(|e| !e.trim().is_empty()),
    })
}

// ─── Email/password ──────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Issued session. The token is also set as a cookie; it is returned for
/// clients that send it as a bearer header instead.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub token: String,
    pub profile: Profile,
}

async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<SignupRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    body.validate()?;
    let full_name = body.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Full name is required".to_string()));
    }

    let session = state
        .identity
        .sign_up(body.email.trim(), &body.password, full_name)
        .await?;
    tracing::info!(user_id = %session.user.id, "User signed up");

    start_session(&state, jar, session).await
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    body.validate()?;

    let session = state
        .identity
        .sign_in(body.email.trim(), &body.password)
        .await?;
    tracing::info!(user_id = %session.user.id, "User signed in");

    start_session(&state, jar, session).await
}

/// Ensure the profile exists and issue the session cookies.
async fn start_session(
    state: &AppState,
    jar: CookieJar,
    session: ProviderSession,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let profile = state.notes.ensure_profile(&session.user).await?;
    tracing::debug!(user_id = %profile.id, name = %profile.display_name(), "Session issued");

    let token = create_jwt(session.user.id, &session.user.email, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let secure = state.config.secure_cookies();
    let jar = jar
        .add(session_cookie(SESSION_COOKIE, token.clone(), secure))
        .add(session_cookie(
            PROVIDER_TOKEN_COOKIE,
            session.access_token,
            secure,
        ));

    Ok((jar, Json(SessionResponse { token, profile })))
}

// ─── External provider (PKCE) ────────────────────────────────

/// Start the provider flow: remember a PKCE verifier and redirect.
async fn provider_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    if provider.is_empty()
        || !provider
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::BadRequest(format!("Unknown provider {:?}", provider)));
    }

    let verifier = generate_code_verifier()?;
    let timestamp = unix_secs()?;
    let signed = sign_pkce_state(&verifier, timestamp, &state.config.jwt_signing_key)?;

    let callback_url = format!("{}{}", service_origin(&headers), CALLBACK_PATH);
    let auth_url =
        state
            .identity
            .authorize_url(&provider, &callback_url, &code_challenge(&verifier));

    tracing::info!(provider = %provider, "Starting provider sign-in");

    let cookie = Cookie::build((PKCE_COOKIE, signed))
        .path(CALLBACK_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.secure_cookies())
        .max_age(time::Duration::seconds(PKCE_MAX_AGE_SECS as i64));

    Ok((jar.add(cookie), Redirect::temporary(&auth_url)))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Provider callback: exchange the code, start the session, go to the
/// dashboard. Any failure lands on the login page with a generic error.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let verifier = jar
        .get(PKCE_COOKIE)
        .and_then(|c| verify_pkce_state(c.value(), &state.config.jwt_signing_key, unix_secs().ok()?));
    let secure = state.config.secure_cookies();
    let jar = jar.add(removal_cookie(PKCE_COOKIE, CALLBACK_PATH, secure));

    let failed = |jar: CookieJar| {
        let target = format!("/auth?error={}", urlencoding::encode(AUTH_FAILED_MESSAGE));
        (jar, Redirect::to(&target))
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Provider returned an error");
        return failed(jar);
    }
    let (Some(code), Some(verifier)) = (params.code, verifier) else {
        tracing::warn!("Callback without code or valid PKCE state");
        return failed(jar);
    };

    let session = match state
        .identity
        .exchange_code_for_session(&code, &verifier)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Code exchange failed");
            return failed(jar);
        }
    };

    match start_session(&state, jar.clone(), session).await {
        Ok((jar, _)) => (jar, Redirect::to("/dashboard")),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start session after provider sign-in");
            failed(jar)
        }
    }
}

/// Sign the verifier so a forged cookie cannot pick the exchange input.
///
/// Format: base64url("verifier|timestamp_hex|signature_hex").
fn sign_pkce_state(verifier: &str, timestamp: u64, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", verifier, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify and decode a signed PKCE cookie. Returns the verifier.
fn verify_pkce_state(value: &str, secret: &[u8], now: u64) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    let [verifier, timestamp_hex, signature_hex] = parts.as_slice() else {
        return None;
    };

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", verifier, timestamp_hex).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::error!("PKCE state signature mismatch");
        return None;
    }

    let issued = u64::from_str_radix(timestamp_hex, 16).ok()?;
    if now.saturating_sub(issued) > PKCE_MAX_AGE_SECS {
        tracing::warn!("PKCE state expired");
        return None;
    }

    Some(verifier.to_string())
}

// ─── Logout ──────────────────────────────────────────────────

/// Sign out at the provider (best effort) and clear the session cookies.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(token) = jar.get(PROVIDER_TOKEN_COOKIE) {
        if let Err(e) = state.identity.sign_out(token.value()).await {
            tracing::warn!(error = %e, "Provider sign-out failed, clearing session anyway");
        }
    }

    let secure = state.config.secure_cookies();
    let jar = jar
        .add(removal_cookie(SESSION_COOKIE, "/", secure))
        .add(removal_cookie(PROVIDER_TOKEN_COOKIE, "/", secure));

    (jar, StatusCode::NO_CONTENT).into_response()
}

// ─── Helpers ─────────────────────────────────────────────────

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

/// Expired cookie with the same attributes it was created with.
fn removal_cookie(name: &'static str, path: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path(path)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Scheme and host this service is reached at.
fn service_origin(headers: &HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };
    format!("{}://{}", scheme, host)
}

fn unix_secs() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_secs())
}
