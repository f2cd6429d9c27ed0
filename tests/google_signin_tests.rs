// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in token verification tests.
//!
//! Tokens are signed with the fixture RSA key the test verifier trusts.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use morning_dispatch::services::IdentityError;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;

const PROJECT: &str = "test-project";

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn valid_claims() -> Value {
    let now = now();
    json!({
        "iss": format!("https://securetoken.google.com/{PROJECT}"),
        "aud": PROJECT,
        "sub": "firebase-uid-1",
        "iat": now,
        "auth_time": now,
        "exp": now + 3600,
        "email": "Ada.Lovelace@Example.com",
        "email_verified": true,
        "name": "Ada Lovelace",
        "picture": "https://lh3.example.com/ada.png",
    })
}

fn sign(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(include_bytes!("fixtures/test_rsa_private.pem")).unwrap();
    encode(&header, claims, &key).unwrap()
}

#[tokio::test]
async fn test_valid_token_yields_identity() {
    let verifier = common::test_identity_verifier(PROJECT);

    let identity = verifier
        .verify(&sign(&valid_claims(), common::TEST_KID))
        .await
        .unwrap();

    assert_eq!(identity.subject, "firebase-uid-1");
    assert_eq!(identity.email, "ada.lovelace@example.com");
    assert_eq!(identity.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(
        identity.picture.as_deref(),
        Some("https://lh3.example.com/ada.png")
    );
}

#[tokio::test]
async fn test_rejected_tokens() {
    let verifier = common::test_identity_verifier(PROJECT);

    let mut wrong_audience = valid_claims();
    wrong_audience["aud"] = json!("another-project");

    let mut wrong_issuer = valid_claims();
    wrong_issuer["iss"] = json!("https://accounts.example.com");

    let mut expired = valid_claims();
    expired["exp"] = json!(now() - 3600);

    let mut unverified = valid_claims();
    unverified["email_verified"] = json!(false);

    let mut no_email = valid_claims();
    no_email.as_object_mut().unwrap().remove("email");

    let mut no_auth_time = valid_claims();
    no_auth_time.as_object_mut().unwrap().remove("auth_time");

    for (name, claims) in [
        ("wrong audience", wrong_audience),
        ("wrong issuer", wrong_issuer),
        ("expired", expired),
        ("unverified email", unverified),
        ("missing email", no_email),
        ("missing auth_time", no_auth_time),
    ] {
        let result = verifier.verify(&sign(&claims, common::TEST_KID)).await;
        assert!(
            matches!(result, Err(IdentityError::Rejected(_))),
            "{name}: {result:?}"
        );
    }

    let result = verifier.verify(&sign(&valid_claims(), "other-kid")).await;
    assert!(matches!(result, Err(IdentityError::Rejected(_))));
}

#[tokio::test]
async fn test_google_route_rejects_bad_token() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/google")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"idToken": "garbage"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Invalid sign-in credential");
}

#[tokio::test]
async fn test_google_route_accepts_valid_token() {
    let (app, _) = common::create_test_app();
    let token = sign(&valid_claims(), common::TEST_KID);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/google")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "idToken": token }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    // The token is accepted; the offline database then fails the lookup.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
