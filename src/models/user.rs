//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::DEFAULT_PROFILE_PICTURE;
use crate::error::AppError;
use crate::time_utils::format_utc_rfc3339;

const USERNAME_MIN_LEN: usize = 7;
const USERNAME_MAX_LEN: usize = 20;
const PASSWORD_MIN_LEN: usize = 6;

/// User account stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Account ID (also used as document ID)
    pub id: String,
    /// Unique handle shown on comments and posts
    pub username: String,
    /// Unique sign-in email
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    /// Avatar URL (hosted by the object store)
    pub profile_picture: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A new non-admin account.
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        profile_picture: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            profile_picture: profile_picture
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROFILE_PICTURE.to_string()),
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User as returned by the API. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub profile_picture: String,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            profile_picture: user.profile_picture,
            is_admin: user.is_admin,
            created_at: format_utc_rfc3339(user.created_at),
            updated_at: format_utc_rfc3339(user.updated_at),
        }
    }
}

/// Check a requested username against the profile rules.
pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AppError::BadRequest(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if username.contains(' ') {
        return Err(AppError::BadRequest(
            "Username cannot contain spaces".to_string(),
        ));
    }
    if username != username.to_lowercase() {
        return Err(AppError::BadRequest(
            "Username must be lowercase".to_string(),
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest(
            "Username can only contain letters and numbers".to_string(),
        ));
    }
    Ok(())
}

/// Check a replacement password on profile update.
pub fn validate_new_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(())
}

/// Derive a username for an account created through Google sign-in.
///
/// "Ada Lovelace" with suffix "0427" becomes "adalovelace0427". Characters the
/// profile rules reject are dropped; if nothing is left the email's local part
/// is used instead.
pub fn google_username(display_name: &str, email: &str, suffix: &str) -> String {
    let clean = |s: &str| -> String {
        s.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect()
    };

    let mut base = clean(display_name);
    if base.is_empty() {
        base = clean(email.split('@').next().unwrap_or_default());
    }
    if base.is_empty() {
        base = "reader".to_string();
    }

    let max_base = USERNAME_MAX_LEN.saturating_sub(suffix.len());
    base.truncate(max_base);
    format!("{}{}", base, suffix)
}
