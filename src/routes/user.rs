// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile and user administration routes.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::ValidateEmail;

use super::extract::{ApiJson, ApiQuery};
use super::{non_blank, ListQuery, MessageResponse};
use crate::db::{collections, SortDirection};
use crate::error::{AppError, Result};
use crate::middleware::auth::{removal_cookie, AuthUser};
use crate::models::{validate_new_password, validate_username, UserResponse};
use crate::services::password;
use crate::time_utils::one_month_before;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/signout", post(signout))
        .route("/api/user/{user_id}", get(get_user))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/update/{user_id}", put(update_user))
        .route("/api/user/delete/{user_id}", delete(delete_user))
        .route("/api/user/getusers", get(get_users))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    profile_picture: Option<String>,
}

/// Update the caller's own profile. Blank fields are left unchanged.
async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    if auth.id != user_id {
        return Err(AppError::Forbidden(
            "You are not allowed to update this user".to_string(),
        ));
    }

    let new_password = body.password.filter(|p| !p.is_empty());
    if let Some(pw) = &new_password {
        validate_new_password(pw)?;
    }
    let new_username = non_blank(body.username);
    if let Some(name) = &new_username {
        validate_username(name)?;
    }
    let new_email = non_blank(body.email).map(|e| e.to_lowercase());
    if let Some(email) = &new_email {
        if !email.validate_email() {
            return Err(AppError::BadRequest("Invalid email address".to_string()));
        }
    }

    let previous = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let mut user = previous.clone();

    if let Some(name) = new_username.filter(|n| *n != user.username) {
        if state.db.find_user_by_username(&name).await?.is_some() {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }
        user.username = name;
    }
    if let Some(email) = new_email.filter(|e| *e != user.email) {
        if state.db.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "Email is already registered".to_string(),
            ));
        }
        user.email = email;
    }
    if let Some(pw) = new_password {
        user.password_hash = password::hash_password_blocking(pw).await?;
    }
    if let Some(picture) = non_blank(body.profile_picture) {
        user.profile_picture = picture;
    }

    user.updated_at = Utc::now();
    state.db.update_user(&previous, &user).await?;

    tracing::info!(user_id = %user.id, "User profile updated");

    Ok(Json(UserResponse::from(user)))
}

/// Delete an account. Users may delete themselves; admins anyone.
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
    Path(user_id): Path<String>,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    if !auth.is_admin && auth.id != user_id {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this user".to_string(),
        ));
    }

    let user = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    state.db.delete_user(&user).await?;

    tracing::info!(user_id = %user_id, deleted_by = %auth.id, "User deleted");

    // Deleting your own account also ends the session.
    let jar = if auth.id == user_id {
        jar.remove(removal_cookie(&state.config))
    } else {
        jar
    };

    Ok((jar, MessageResponse::ok("User has been deleted")))
}

/// Clear the session cookie.
async fn signout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(removal_cookie(&state.config)),
        MessageResponse::ok("User has been signed out"),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UsersPage {
    pub users: Vec<UserResponse>,
    pub total_users: u64,
    pub last_month_users: u64,
}

/// Admin listing of all users, newest first unless `sort=asc`.
async fn get_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<UsersPage>> {
    if !auth.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to see all users".to_string(),
        ));
    }

    let options = query.options(SortDirection::Descending);
    let (users, total_users, last_month_users) = tokio::try_join!(
        state.db.list_users(&options),
        state.db.count(collections::USERS, None),
        state
            .db
            .count(collections::USERS, Some(one_month_before(Utc::now()))),
    )?;

    Ok(Json(UsersPage {
        users: users.into_iter().map(UserResponse::from).collect(),
        total_users,
        last_month_users,
    }))
}

/// Public profile lookup, used to show comment authors.
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>> {
    let user = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from(user)))
}
