// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Comment model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::time_utils::format_utc_rfc3339;

/// Longest comment the client will submit, in characters.
pub const MAX_COMMENT_LEN: usize = 200;

/// Stored comment record in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Comment ID (also used as document ID)
    pub id: String,
    pub content: String,
    /// Post the comment replies to
    pub post_id: String,
    /// Owner
    pub user_id: String,
    /// IDs of users who liked the comment
    #[serde(default)]
    pub likes: Vec<String>,
    /// Always equal to `likes.len()`
    #[serde(default)]
    pub number_of_likes: u32,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: String, user_id: String, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            post_id,
            user_id,
            likes: Vec::new(),
            number_of_likes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Like the comment for `user_id`, or take the like back if already given.
    ///
    /// Returns `true` if the comment is now liked by the user.
    pub fn toggle_like(&mut self, user_id: &str) -> bool {
        let liked = match self.likes.iter().position(|id| id == user_id) {
            Some(index) => {
                self.likes.remove(index);
                false
            }
            None => {
                self.likes.push(user_id.to_string());
                true
            }
        };
        self.number_of_likes = self.likes.len() as u32;
        liked
    }

    /// Owners and admins may edit or delete a comment.
    pub fn can_be_modified_by(&self, user: &AuthUser) -> bool {
        user.is_admin || self.user_id == user.id
    }
}

/// Check comment text before it is stored.
pub fn validate_comment_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Comment cannot be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comment length must be lower than or equal to {} characters",
            MAX_COMMENT_LEN
        )));
    }
    Ok(())
}

/// Comment as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CommentResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub post_id: String,
    pub user_id: String,
    pub likes: Vec<String>,
    pub number_of_likes: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            post_id: comment.post_id,
            user_id: comment.user_id,
            likes: comment.likes,
            number_of_likes: comment.number_of_likes,
            created_at: format_utc_rfc3339(comment.created_at),
            updated_at: format_utc_rfc3339(comment.updated_at),
        }
    }
}
