// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account sign-up and sign-in routes.

use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::extract::ApiJson;
use super::{non_blank, validate_request, MessageResponse};
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, session_cookie};
use crate::models::{google_username, User, UserResponse};
use crate::services::password;
use crate::AppState;

/// Attempts at finding a free username for a new Google account.
const USERNAME_ATTEMPTS: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/signin", post(signin))
        .route("/api/auth/google", post(google))
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Sign-up fields after the presence check.
#[derive(Debug, Validate)]
struct NewAccount {
    username: String,
    #[validate(email(message = "Invalid email address"))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
}

/// Create a password account.
async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> Result<Json<MessageResponse>> {
    let (Some(username), Some(email), Some(password)) = (
        non_blank(body.username),
        non_blank(body.email),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    };

    let account = NewAccount {
        username,
        email: email.to_lowercase(),
        password,
    };
    validate_request(&account)?;

    if state.db.find_user_by_email(&account.email).await?.is_some() {
        return Err(AppError::Conflict(
            "Email is already registered".to_string(),
        ));
    }
    if state
        .db
        .find_user_by_username(&account.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username is already taken".to_string()));
    }

    let password_hash = password::hash_password_blocking(account.password).await?;
    let user = User::new(account.username, account.email, password_hash, None);
    state.db.create_user(&user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

    Ok(MessageResponse::ok("Signup successful"))
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Sign in with email and password.
async fn signin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(body): ApiJson<SigninRequest>,
) -> Result<(CookieJar, Json<UserResponse>)> {
    let (Some(email), Some(password)) = (
        non_blank(body.email),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    };

    let user = state
        .db
        .find_user_by_email(&email.to_lowercase())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !password::verify_password_blocking(password, user.password_hash.clone()).await? {
        tracing::info!(user_id = %user.id, "Rejected sign-in with wrong password");
        return Err(AppError::BadRequest("Invalid password".to_string()));
    }

    tracing::info!(user_id = %user.id, "User signed in");
    start_session(&state, jar, user)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    #[serde(default)]
    id_token: Option<String>,
}

/// Sign in with a Google ID token, creating the account on first use.
async fn google(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(body): ApiJson<GoogleRequest>,
) -> Result<(CookieJar, Json<UserResponse>)> {
    let id_token = non_blank(body.id_token)
        .ok_or_else(|| AppError::BadRequest("Missing Google credential".to_string()))?;

    let identity = state.identity_verifier.verify(&id_token).await?;

    if let Some(user) = state.db.find_user_by_email(&identity.email).await? {
        tracing::info!(user_id = %user.id, "User signed in with Google");
        return start_session(&state, jar, user);
    }

    let display_name = identity.name.as_deref().unwrap_or_default();
    let mut username = None;
    for _ in 0..USERNAME_ATTEMPTS {
        let candidate =
            google_username(display_name, &identity.email, &password::random_digits(4)?);
        if state.db.find_user_by_username(&candidate).await?.is_none() {
            username = Some(candidate);
            break;
        }
    }
    let username = username.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "no free username for {} after {} attempts",
            identity.email,
            USERNAME_ATTEMPTS
        ))
    })?;

    let password_hash = password::hash_password_blocking(password::generate_password()?).await?;
    let user = User::new(username, identity.email, password_hash, identity.picture);
    if let Err(err) = state.db.create_user(&user).await {
        // A concurrent first sign-in for the same email may have won.
        if let AppError::Conflict(_) = err {
            if let Some(existing) = state.db.find_user_by_email(&user.email).await? {
                tracing::info!(user_id = %existing.id, "User signed in with Google");
                return start_session(&state, jar, existing);
            }
        }
        return Err(err);
    }

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        google_subject = %identity.subject,
        "Created account from Google sign-in"
    );

    start_session(&state, jar, user)
}

/// Issue a session token for `user` and attach it to the response cookies.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
) -> Result<(CookieJar, Json<UserResponse>)> {
    let token = create_jwt(
        &user.id,
        user.is_admin,
        &state.config.jwt_signing_key,
        state.config.session_ttl_days,
    )?;

    Ok((
        jar.add(session_cookie(token, &state.config)),
        Json(UserResponse::from(user)),
    ))
}
