// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Post authoring and listing routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::extract::{ApiJson, ApiQuery};
use super::{non_blank, MessageResponse};
use crate::db::{collections, ListOptions, PostFilter, SortDirection};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Post, PostResponse};
use crate::time_utils::one_month_before;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/post/getposts", get(get_posts))
        // Older client builds use the camel-case spelling.
        .route("/api/post/getPosts", get(get_posts))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/post/create", post(create_post))
        .route("/api/post/deletepost/{post_id}/{user_id}", delete(delete_post))
        .route("/api/post/updatepost/{post_id}/{user_id}", put(update_post))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePostRequest {
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
    image: Option<String>,
}

/// Publish a new post (admin only).
async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>)> {
    if !auth.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to create a post".to_string(),
        ));
    }

    let (Some(title), Some(content)) = (non_blank(body.title), non_blank(body.content)) else {
        return Err(AppError::BadRequest(
            "Please provide all required fields".to_string(),
        ));
    };

    let post = Post::new(auth.id, title, content, body.category, body.image);
    if post.slug.is_empty() {
        return Err(AppError::BadRequest(
            "Title must contain letters or numbers".to_string(),
        ));
    }
    if state.db.find_post_by_slug(&post.slug).await?.is_some() {
        return Err(AppError::Conflict(
            "A post with this title already exists".to_string(),
        ));
    }

    state.db.create_post(&post).await?;

    tracing::info!(post_id = %post.id, slug = %post.slug, author = %post.user_id, "Post created");

    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsQuery {
    user_id: Option<String>,
    category: Option<String>,
    slug: Option<String>,
    post_id: Option<String>,
    search_term: Option<String>,
    #[serde(alias = "sort")]
    order: Option<String>,
    start_index: Option<u32>,
    limit: Option<u32>,
}

impl PostsQuery {
    fn into_parts(self) -> (PostFilter, ListOptions) {
        let options = ListOptions::new(
            self.start_index,
            self.limit,
            SortDirection::from_param(self.order.as_deref(), SortDirection::Descending),
        );
        let filter = PostFilter {
            user_id: self.user_id,
            category: self.category,
            slug: self.slug,
            post_id: self.post_id,
            search_term: self.search_term,
        }
        .normalized();
        (filter, options)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PostsPage {
    pub posts: Vec<PostResponse>,
    /// Counts cover every post, not just the filtered ones.
    pub total_posts: u64,
    pub last_month_posts: u64,
}

/// Filtered, paginated post listing, most recently updated first by default.
async fn get_posts(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PostsQuery>,
) -> Result<Json<PostsPage>> {
    let (filter, options) = query.into_parts();

    let (posts, total_posts, last_month_posts) = tokio::try_join!(
        state.db.query_posts(&filter, &options),
        state.db.count(collections::POSTS, None),
        state
            .db
            .count(collections::POSTS, Some(one_month_before(Utc::now()))),
    )?;

    Ok(Json(PostsPage {
        posts: posts.into_iter().map(PostResponse::from).collect(),
        total_posts,
        last_month_posts,
    }))
}

/// Only an admin acting as the named user may change or remove a post.
fn check_post_admin(auth: &AuthUser, user_id: &str, action: &str) -> Result<()> {
    if !auth.is_admin || auth.id != user_id {
        return Err(AppError::Forbidden(format!(
            "You are not allowed to {} this post",
            action
        )));
    }
    Ok(())
}

/// Delete a post together with its comments.
async fn delete_post(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((post_id, user_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>> {
    check_post_admin(&auth, &user_id, "delete")?;

    let post = state
        .db
        .get_post(&post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
    let removed_comments = state.db.delete_post(&post).await?;

    tracing::info!(
        post_id = %post_id,
        removed_comments,
        deleted_by = %auth.id,
        "Post deleted"
    );

    Ok(MessageResponse::ok("The post has been deleted"))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
    image: Option<String>,
}

/// Edit a post. The slug is kept so existing links stay valid.
async fn update_post(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((post_id, user_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<UpdatePostRequest>,
) -> Result<Json<PostResponse>> {
    check_post_admin(&auth, &user_id, "update")?;

    let mut post = state
        .db
        .get_post(&post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if let Some(title) = non_blank(body.title) {
        post.title = title;
    }
    if let Some(content) = non_blank(body.content) {
        post.content = content;
    }
    if let Some(category) = non_blank(body.category) {
        post.category = category;
    }
    if let Some(image) = non_blank(body.image) {
        post.image = image;
    }
    post.updated_at = Utc::now();

    state.db.update_post(&post).await?;

    tracing::info!(post_id = %post.id, updated_by = %auth.id, "Post updated");

    Ok(Json(PostResponse::from(post)))
}
