// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session gate.
//!
//! Sessions are HS256 JWTs minted by this service after the identity provider
//! authenticates the user. They travel in the `collab_session` cookie, or in an
//! `Authorization: Bearer` header for non-browser clients.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "collab_session";

/// Session lifetime in seconds (30 days).
pub const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from the session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: Uuid, email: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Verify a session token.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<AuthUser, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(token, &key, &validation).map_err(|_| AppError::InvalidToken)?;

    let user_id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        email: token_data.claims.email,
    })
}

/// Resolve the session from a request's cookies or bearer header.
///
/// The cookie wins when both are present.
pub fn authenticate(
    jar: &CookieJar,
    headers: &HeaderMap,
    signing_key: &[u8],
) -> Result<AuthUser, AppError> {
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) => token.trim().to_string(),
            None => return Err(AppError::Unauthorized),
        }
    };

    verify_jwt(&token, signing_key)
}

/// Middleware for API routes: 401 without a valid session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&jar, request.headers(), &state.config.jwt_signing_key)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Middleware for views: redirect to `/auth` without a valid session.
///
/// Runs before the handler so no data is fetched for anonymous visitors.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&jar, request.headers(), &state.config.jwt_signing_key) {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(_) => {
            tracing::debug!(path = %request.uri().path(), "No session, redirecting to /auth");
            Redirect::to("/auth").into_response()
        }
    }
}
