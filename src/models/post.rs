// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Post (article) model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::{DEFAULT_CATEGORY, DEFAULT_POST_IMAGE};
use crate::time_utils::format_utc_rfc3339;

/// Stored article record in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Post ID (also used as document ID)
    pub id: String,
    /// Author's user ID
    pub user_id: String,
    pub title: String,
    /// Rich-text HTML produced by the editor; stored as-is
    pub content: String,
    /// Cover image URL
    pub image: String,
    pub category: String,
    /// URL-safe unique identifier derived from the title
    pub slug: String,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// A new post; missing or blank image/category fall back to defaults.
    pub fn new(
        user_id: String,
        title: String,
        content: String,
        category: Option<String>,
        image: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let slug = slugify(&title);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            title,
            content,
            image: non_blank(image).unwrap_or_else(|| DEFAULT_POST_IMAGE.to_string()),
            category: non_blank(category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            slug,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `needle` (already lowercased) occurs in the title or content.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.content.to_lowercase().contains(needle)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Derive the URL slug for a title.
///
/// Words are joined with `-`, lowercased, and anything other than ASCII
/// letters, digits and `-` is dropped: "Hello, World 2025!" -> "hello-world-2025".
pub fn slugify(title: &str) -> String {
    title
        .split(' ')
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Post as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PostResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub image: String,
    pub category: String,
    pub slug: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            title: post.title,
            content: post.content,
            image: post.image,
            category: post.category,
            slug: post.slug,
            created_at: format_utc_rfc3339(post.created_at),
            updated_at: format_utc_rfc3339(post.updated_at),
        }
    }
}
