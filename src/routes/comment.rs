// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Comment routes.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::extract::{ApiJson, ApiQuery};
use super::{non_blank, ListQuery, MessageResponse};
use crate::db::{collections, SortDirection};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{validate_comment_content, Comment, CommentResponse};
use crate::time_utils::one_month_before;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/comment/getPostComments/{post_id}",
        get(get_post_comments),
    )
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/comment/create", post(create_comment))
        .route("/api/comment/likeComment/{comment_id}", put(like_comment))
        .route("/api/comment/editComment/{comment_id}", put(edit_comment))
        .route(
            "/api/comment/deleteComment/{comment_id}",
            delete(delete_comment),
        )
        .route("/api/comment/getcomments", get(get_comments))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    content: Option<String>,
    post_id: Option<String>,
    user_id: Option<String>,
}

/// Add a comment to a post as the signed-in user.
async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateCommentRequest>,
) -> Result<Json<CommentResponse>> {
    if body.user_id.as_deref() != Some(auth.id.as_str()) {
        return Err(AppError::Forbidden(
            "You are not allowed to create this comment".to_string(),
        ));
    }

    let content = body.content.unwrap_or_default();
    validate_comment_content(&content)?;
    let post_id = non_blank(body.post_id)
        .ok_or_else(|| AppError::BadRequest("Missing post ID".to_string()))?;

    if state.db.get_post(&post_id).await?.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let comment = Comment::new(post_id, auth.id, content);
    state.db.upsert_comment(&comment).await?;

    tracing::info!(
        comment_id = %comment.id,
        post_id = %comment.post_id,
        user_id = %comment.user_id,
        "Comment created"
    );

    Ok(Json(CommentResponse::from(comment)))
}

/// All comments on a post, newest first.
async fn get_post_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>> {
    let comments = state.db.get_post_comments(&post_id).await?;
    Ok(Json(
        comments.into_iter().map(CommentResponse::from).collect(),
    ))
}

/// Like or unlike a comment as the caller.
async fn like_comment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(comment_id): Path<String>,
) -> Result<Json<CommentResponse>> {
    let comment = state
        .db
        .toggle_comment_like(&comment_id, &auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    tracing::debug!(
        comment_id = %comment.id,
        user_id = %auth.id,
        number_of_likes = comment.number_of_likes,
        "Comment like toggled"
    );

    Ok(Json(CommentResponse::from(comment)))
}

#[derive(Debug, Default, Deserialize)]
pub struct EditCommentRequest {
    content: Option<String>,
}

/// Replace a comment's text. Owners and admins only.
async fn edit_comment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(comment_id): Path<String>,
    ApiJson(body): ApiJson<EditCommentRequest>,
) -> Result<Json<CommentResponse>> {
    let content = body.content.unwrap_or_default();
    validate_comment_content(&content)?;

    let mut comment = state
        .db
        .get_comment(&comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if !comment.can_be_modified_by(&auth) {
        return Err(AppError::Forbidden(
            "You are not allowed to edit this comment".to_string(),
        ));
    }

    comment.content = content;
    comment.updated_at = Utc::now();
    state.db.upsert_comment(&comment).await?;

    tracing::info!(comment_id = %comment.id, edited_by = %auth.id, "Comment edited");

    Ok(Json(CommentResponse::from(comment)))
}

/// Remove a comment. Owners and admins only.
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(comment_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let comment = state
        .db
        .get_comment(&comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if !comment.can_be_modified_by(&auth) {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this comment".to_string(),
        ));
    }

    state.db.delete_comment(&comment_id).await?;

    tracing::info!(comment_id = %comment_id, deleted_by = %auth.id, "Comment deleted");

    Ok(MessageResponse::ok("Comment has been deleted"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CommentsPage {
    pub comments: Vec<CommentResponse>,
    pub total_comments: u64,
    pub last_month_comments: u64,
}

/// Admin listing of all comments, oldest first unless `sort=desc`.
async fn get_comments(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<CommentsPage>> {
    if !auth.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to get all comments".to_string(),
        ));
    }

    let options = query.options(SortDirection::Ascending);
    let (comments, total_comments, last_month_comments) = tokio::try_join!(
        state.db.list_comments(&options),
        state.db.count(collections::COMMENTS, None),
        state
            .db
            .count(collections::COMMENTS, Some(one_month_before(Utc::now()))),
    )?;

    Ok(Json(CommentsPage {
        comments: comments.into_iter().map(CommentResponse::from).collect(),
        total_comments,
        last_month_comments,
    }))
}
