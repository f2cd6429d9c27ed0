// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication: JWT creation, the session cookie and the
//! middleware guarding protected routes.

use crate::config::{Config, SESSION_COOKIE};
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Admin flag at the time the session was issued
    #[serde(default)]
    pub is_admin: bool,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub is_admin: bool,
}

/// Middleware that requires valid JWT authentication.
///
/// The session cookie is tried first, then an `Authorization: Bearer`
/// header for non-browser clients. A stale cookie does not hide a valid
/// header token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = &state.config.jwt_signing_key;
    let cookie_token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let bearer_token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let auth_user = match (cookie_token, bearer_token) {
        (None, None) => return Err(AppError::Unauthorized),
        (Some(token), None) | (None, Some(token)) => verify_jwt(&token, key)?,
        (Some(cookie), Some(bearer)) => match verify_jwt(&cookie, key) {
            Ok(user) => user,
            Err(_) => verify_jwt(&bearer, key)?,
        },
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Decode and validate a session token.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<AuthUser, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::InvalidToken
    })?;

    if token_data.claims.sub.is_empty() {
        return Err(AppError::InvalidToken);
    }

    Ok(AuthUser {
        id: token_data.claims.sub,
        is_admin: token_data.claims.is_admin,
    })
}

/// Create a JWT for a user session.
pub fn create_jwt(
    user_id: &str,
    is_admin: bool,
    signing_key: &[u8],
    ttl_days: u32,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        is_admin,
        iat: now,
        exp: now + ttl_days as usize * 24 * 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

fn base_cookie(value: String, config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure())
        .build()
}

/// Session cookie carrying a freshly issued token.
pub fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    let mut cookie = base_cookie(token, config);
    cookie.set_max_age(time::Duration::days(i64::from(config.session_ttl_days)));
    cookie
}

/// Cookie that, passed to `CookieJar::remove`, clears the session.
///
/// Attributes must match the ones used at creation or browsers keep the
/// original cookie.
pub fn removal_cookie(config: &Config) -> Cookie<'static> {
    base_cookie(String::new(), config)
}
