// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod comment;
pub mod post;
pub mod user;

pub use comment::{validate_comment_content, Comment, CommentResponse};
pub use post::{slugify, Post, PostResponse};
pub use user::{google_username, validate_new_password, validate_username, User, UserResponse};
