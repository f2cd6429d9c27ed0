// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::response::Response;
use jsonwebtoken::DecodingKey;
use morning_dispatch::config::Config;
use morning_dispatch::db::FirestoreDb;
use morning_dispatch::middleware::auth::create_jwt;
use morning_dispatch::routes::create_router;
use morning_dispatch::services::IdentityVerifier;
use morning_dispatch::AppState;
use std::sync::Arc;

/// Key id the test identity verifier accepts.
#[allow(dead_code)]
pub const TEST_KID: &str = "test-kid";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Identity verifier trusting the RSA key in `tests/fixtures`.
#[allow(dead_code)]
pub fn test_identity_verifier(project_id: &str) -> IdentityVerifier {
    let key = DecodingKey::from_rsa_pem(include_bytes!("../fixtures/test_rsa_public.pem"))
        .expect("fixture public key should parse");
    IdentityVerifier::new_with_static_key(project_id, TEST_KID, key)
        .expect("static verifier should build")
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

/// Same as `create_test_app`, with a custom frontend URL.
#[allow(dead_code)]
pub fn create_test_app_with_frontend_url(frontend_url: &str) -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config {
        frontend_url: frontend_url.to_string(),
        ..Config::test_default()
    })
}

fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    build_app(config, test_db_offline())
}

/// Create a test app backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn create_emulator_app() -> (axum::Router, Arc<AppState>) {
    build_app(Config::test_default(), test_db().await)
}

fn build_app(config: Config, db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    let identity_verifier = Arc::new(test_identity_verifier(&config.firebase_project_id));

    let state = Arc::new(AppState {
        config,
        db,
        identity_verifier,
    });

    (create_router(state.clone()), state)
}

/// Session token for `user_id`, signed with the test config's key.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, is_admin: bool, state: &AppState) -> String {
    create_jwt(user_id, is_admin, &state.config.jwt_signing_key, 1).expect("JWT should encode")
}

/// Cookie header value carrying a session for `user_id`.
#[allow(dead_code)]
pub fn session_cookie_header(user_id: &str, is_admin: bool, state: &AppState) -> String {
    format!("access_token={}", create_test_jwt(user_id, is_admin, state))
}

/// Read a JSON response body.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Generate a unique suffix for test isolation.
#[allow(dead_code)]
pub fn unique_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{:x}", nanos)
}
