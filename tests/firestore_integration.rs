// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with FIRESTORE_EMULATOR_HOST pointing at a local emulator.
//!
//! The emulator keeps documents across tests, so each test works on its own
//! unique users, categories and posts.

use chrono::{Duration, Utc};
use morning_dispatch::db::{collections, ListOptions, PostFilter, SortDirection};
use morning_dispatch::error::AppError;
use morning_dispatch::models::{Comment, Post, User};

mod common;
use common::{test_db, unique_suffix};

fn test_user(suffix: &str) -> User {
    User::new(
        format!("reader{suffix}"),
        format!("reader{suffix}@example.com"),
        "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        None,
    )
}

fn test_post(author: &str, title: &str, category: &str) -> Post {
    Post::new(
        author.to_string(),
        title.to_string(),
        format!("<p>Body of {title}</p>"),
        Some(category.to_string()),
        None,
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_lookup_by_email_and_username() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let user = test_user(&suffix);

    assert!(db.find_user_by_email(&user.email).await.unwrap().is_none());

    db.create_user(&user).await.unwrap();

    let by_email = db.find_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);
    assert!(!by_email.is_admin);

    let by_name = db
        .find_user_by_username(&user.username)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_name.email, user.email);

    db.delete_user(&user).await.unwrap();
    assert!(db.get_user(&user.id).await.unwrap().is_none());

    // Deleting frees the email and username for a new account.
    let again = test_user(&suffix);
    db.create_user(&again).await.unwrap();
    db.delete_user(&again).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_signups_claim_email_once() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let first = test_user(&suffix);
    let mut second = test_user(&suffix);
    second.username = format!("other{suffix}");

    let (a, b) = tokio::join!(db.create_user(&first), db.create_user(&second));

    let oks = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(oks, 1, "{a:?} {b:?}");
    let failed = if a.is_err() { a } else { b };
    assert!(matches!(failed, Err(AppError::Conflict(_))));

    // Only one account ended up owning the email.
    let owner = db.find_user_by_email(&first.email).await.unwrap().unwrap();
    assert!(owner.id == first.id || owner.id == second.id);
}

#[tokio::test]
async fn test_update_user_moves_username_reservation() {
    require_emulator!();

    let db = test_db().await;
    let taken = test_user(&unique_suffix());
    db.create_user(&taken).await.unwrap();

    let previous = test_user(&unique_suffix());
    db.create_user(&previous).await.unwrap();

    let mut clash = previous.clone();
    clash.username = taken.username.clone();
    assert!(matches!(
        db.update_user(&previous, &clash).await,
        Err(AppError::Conflict(_))
    ));

    let mut renamed = previous.clone();
    renamed.username = format!("renamed{}", unique_suffix());
    db.update_user(&previous, &renamed).await.unwrap();

    // The old username is free again.
    let mut reuse = test_user(&unique_suffix());
    reuse.username = previous.username.clone();
    db.create_user(&reuse).await.unwrap();
}

#[tokio::test]
async fn test_count_since() {
    require_emulator!();

    let db = test_db().await;
    let before = db.count(collections::USERS, None).await.unwrap();

    let mut old_user = test_user(&unique_suffix());
    old_user.created_at = Utc::now() - Duration::days(90);
    db.create_user(&old_user).await.unwrap();
    let new_user = test_user(&unique_suffix());
    db.create_user(&new_user).await.unwrap();

    let total = db.count(collections::USERS, None).await.unwrap();
    assert!(total >= before + 2);

    let since = Utc::now() - Duration::days(30);
    let recent = db.count(collections::USERS, Some(since)).await.unwrap();
    assert!(recent >= 1);
    assert!(recent < total);
}

// ═══════════════════════════════════════════════════════════════════════════
// POST TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_post_query_filters_and_pagination() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let category = format!("cat{suffix}");
    let author = format!("author{suffix}");

    let mut posts = Vec::new();
    for (i, title) in ["Rust in Production", "Gardening Notes", "Rusty Bikes"]
        .iter()
        .enumerate()
    {
        let mut post = test_post(&author, &format!("{title} {suffix}"), &category);
        post.updated_at = Utc::now() - Duration::minutes(10 - i as i64);
        db.create_post(&post).await.unwrap();
        posts.push(post);
    }

    let filter = PostFilter {
        category: Some(category.clone()),
        ..Default::default()
    };

    // Newest update first.
    let page = db
        .query_posts(
            &filter,
            &ListOptions::new(None, Some(2), SortDirection::Descending),
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, posts[2].id);
    assert_eq!(page[1].id, posts[1].id);

    let rest = db
        .query_posts(
            &filter,
            &ListOptions::new(Some(2), Some(2), SortDirection::Descending),
        )
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, posts[0].id);

    // Search matches title or content, case-insensitively.
    let search = PostFilter {
        category: Some(category.clone()),
        search_term: Some("RUST".to_string()),
        ..Default::default()
    }
    .normalized();
    let found = db
        .query_posts(
            &search,
            &ListOptions::new(None, None, SortDirection::Ascending),
        )
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![posts[0].id.as_str(), posts[2].id.as_str()]);

    let by_slug = db.find_post_by_slug(&posts[1].slug).await.unwrap().unwrap();
    assert_eq!(by_slug.id, posts[1].id);
}

#[tokio::test]
async fn test_delete_post_cascades_comments() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let post = test_post("author", &format!("Doomed {suffix}"), "uncategorized");
    db.create_post(&post).await.unwrap();

    let mut comment_ids = Vec::new();
    for i in 0..3 {
        let comment = Comment::new(post.id.clone(), format!("user{i}"), format!("Reply {i}"));
        db.upsert_comment(&comment).await.unwrap();
        comment_ids.push(comment.id);
    }

    let removed = db.delete_post(&post).await.unwrap();
    assert_eq!(removed, 3);

    assert!(db.get_post(&post.id).await.unwrap().is_none());
    for id in comment_ids {
        assert!(db.get_comment(&id).await.unwrap().is_none());
    }

    // The slug can be used again once the post is gone.
    let reposted = test_post("author", &post.title, "uncategorized");
    assert_eq!(reposted.slug, post.slug);
    db.create_post(&reposted).await.unwrap();
}

#[tokio::test]
async fn test_duplicate_slug_is_conflict() {
    require_emulator!();

    let db = test_db().await;
    let title = format!("Same Title {}", unique_suffix());
    let first = test_post("author", &title, "uncategorized");
    let second = test_post("author", &title, "uncategorized");

    let (a, b) = tokio::join!(db.create_post(&first), db.create_post(&second));
    assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
    let failed = if a.is_err() { a } else { b };
    assert!(matches!(failed, Err(AppError::Conflict(_))));
}

// ═══════════════════════════════════════════════════════════════════════════
// COMMENT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_post_comments_newest_first() {
    require_emulator!();

    let db = test_db().await;
    let post_id = format!("post{}", unique_suffix());

    let mut first = Comment::new(post_id.clone(), "u1".to_string(), "First".to_string());
    first.created_at = Utc::now() - Duration::minutes(5);
    let second = Comment::new(post_id.clone(), "u2".to_string(), "Second".to_string());
    db.upsert_comment(&first).await.unwrap();
    db.upsert_comment(&second).await.unwrap();

    let thread = db.get_post_comments(&post_id).await.unwrap();
    let contents: Vec<_> = thread.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["Second", "First"]);
}

#[tokio::test]
async fn test_toggle_comment_like() {
    require_emulator!();

    let db = test_db().await;
    let comment = Comment::new(
        format!("post{}", unique_suffix()),
        "author".to_string(),
        "Like me".to_string(),
    );
    db.upsert_comment(&comment).await.unwrap();

    let liked = db
        .toggle_comment_like(&comment.id, "fan")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(liked.likes, vec!["fan".to_string()]);
    assert_eq!(liked.number_of_likes, 1);

    let unliked = db
        .toggle_comment_like(&comment.id, "fan")
        .await
        .unwrap()
        .unwrap();
    assert!(unliked.likes.is_empty());
    assert_eq!(unliked.number_of_likes, 0);

    let stored = db.get_comment(&comment.id).await.unwrap().unwrap();
    assert_eq!(stored.number_of_likes, 0);

    assert!(db
        .toggle_comment_like("missing-comment", "fan")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_concurrent_likes_are_all_kept() {
    require_emulator!();

    let db = test_db().await;
    let comment = Comment::new(
        format!("post{}", unique_suffix()),
        "author".to_string(),
        "Popular".to_string(),
    );
    db.upsert_comment(&comment).await.unwrap();

    let fans: Vec<String> = (0..4).map(|i| format!("fan{i}")).collect();
    let results = like_concurrently(&db, &comment.id, &fans).await;
    for result in results {
        assert!(result.unwrap().is_some());
    }

    let stored = db.get_comment(&comment.id).await.unwrap().unwrap();
    assert_eq!(stored.number_of_likes, fans.len() as u32);
    let mut likes = stored.likes.clone();
    likes.sort();
    assert_eq!(likes, fans);
}

async fn like_concurrently(
    db: &morning_dispatch::db::FirestoreDb,
    comment_id: &str,
    fans: &[String],
) -> Vec<Result<Option<Comment>, AppError>> {
    let handles: Vec<_> = fans
        .iter()
        .map(|fan| {
            let db = db.clone();
            let comment_id = comment_id.to_string();
            let fan = fan.clone();
            tokio::spawn(async move { db.toggle_comment_like(&comment_id, &fan).await })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}
