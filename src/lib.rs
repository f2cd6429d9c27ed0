// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Morning Dispatch: a blog/news publishing API.
//!
//! This crate provides the backend for the Morning Dispatch client: account
//! sign-up and sign-in, article authoring, browsing and search, comments and
//! the admin dashboard listings.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::IdentityVerifier;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub identity_verifier: Arc<IdentityVerifier>,
}
