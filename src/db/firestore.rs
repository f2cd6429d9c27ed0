// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (accounts and admin listing)
//! - Posts (articles, filtered listing and search)
//! - Comments (per-post threads, likes, admin listing)

use crate::db::collections;
use crate::db::query::{ListOptions, PostFilter};
use crate::error::AppError;
use crate::models::{Comment, Post, User};
use chrono::{DateTime, Utc};
use firestore::errors::{BackoffError, FirestoreError};
use firestore::{
    FirestoreQueryDirection, FirestoreTimestamp, FirestoreTransaction, FirestoreWritePrecondition,
};
use serde::{Deserialize, Serialize};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Result row of a count aggregation.
#[derive(Debug, Deserialize)]
struct CountAggregate {
    count: usize,
}

/// Marker document that claims a unique value (email, username, slug) for
/// one owner. Its ID is derived from the value, so a second create-only
/// write for the same value fails the whole transaction.
#[derive(Debug, Serialize, Deserialize)]
struct KeyReservation {
    owner_id: String,
    value: String,
}

/// Document ID for a reserved value. Values may contain `/`, so they are
/// hashed rather than used directly.
fn reservation_id(value: &str) -> String {
    hex::encode(ring::digest::digest(&ring::digest::SHA256, value.as_bytes()))
}

/// Map a failed commit of a reserving transaction. A create-only write that
/// hit an existing document means the value is taken.
fn commit_error(error: FirestoreError, conflict: &str) -> AppError {
    match error {
        FirestoreError::DataConflictError(_) => AppError::Conflict(conflict.to_string()),
        FirestoreError::DatabaseError(ref e)
            if e.public.code == "AlreadyExists" || e.public.code == "FailedPrecondition" =>
        {
            AppError::Conflict(conflict.to_string())
        }
        other => AppError::Database(format!("Transaction commit failed: {}", other)),
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Helpers ─────────────────────────────────────────

    /// Count documents in a collection, optionally only those created at or
    /// after `since`.
    pub async fn count(
        &self,
        collection: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError> {
        let rows: Vec<CountAggregate> = self
            .get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| {
                q.for_all([since.and_then(|s| {
                    q.field("created_at")
                        .greater_than_or_equal(FirestoreTimestamp(s))
                })])
            })
            .aggregate(|a| a.fields([a.field("count").count()]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.first().map(|row| row.count as u64).unwrap_or(0))
    }

    /// Fetch one page of a collection ordered by creation time.
    async fn list_by_created_at<T>(
        &self,
        collection: &str,
        options: &ListOptions,
    ) -> Result<Vec<T>, AppError>
    where
        for<'de> T: Deserialize<'de> + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .order_by([("created_at", FirestoreQueryDirection::from(options.direction))])
            .offset(options.start_index)
            .limit(options.limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    /// Add a create-only reservation of `value` in `collection` to a transaction.
    fn reserve_key(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        collection: &str,
        value: &str,
        owner_id: &str,
    ) -> Result<(), AppError> {
        let reservation = KeyReservation {
            owner_id: owner_id.to_string(),
            value: value.to_string(),
        };
        self.get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(reservation_id(value))
            .object(&reservation)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add reservation to transaction for {}: {}",
                    collection, e
                ))
            })?;
        Ok(())
    }

    /// Add removal of the reservation of `value` in `collection` to a transaction.
    fn release_key(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        collection: &str,
        value: &str,
    ) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(reservation_id(value))
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add release to transaction for {}: {}",
                    collection, e
                ))
            })?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up a user by sign-in email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_user_by_field("email", email).await
    }

    /// Look up a user by username.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.find_user_by_field("username", username).await
    }

    async fn find_user_by_field(
        &self,
        field: &'static str,
        value: &str,
    ) -> Result<Option<User>, AppError> {
        let value = value.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    /// Store a new account, reserving its email and username.
    ///
    /// Fails with `AppError::Conflict` if either is already taken, even when a
    /// concurrent request got past the lookup checks first.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.reserve_key(&mut transaction, collections::USER_EMAILS, &user.email, &user.id)?;
        self.reserve_key(
            &mut transaction,
            collections::USERNAMES,
            &user.username,
            &user.id,
        )?;
        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| commit_error(e, "Email or username is already in use"))?;

        tracing::debug!(user_id = %user.id, "Created user");
        Ok(())
    }

    /// Replace a user document, moving email/username reservations that changed.
    pub async fn update_user(&self, previous: &User, user: &User) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        if previous.email != user.email {
            self.reserve_key(&mut transaction, collections::USER_EMAILS, &user.email, &user.id)?;
            self.release_key(&mut transaction, collections::USER_EMAILS, &previous.email)?;
        }
        if previous.username != user.username {
            self.reserve_key(
                &mut transaction,
                collections::USERNAMES,
                &user.username,
                &user.id,
            )?;
            self.release_key(&mut transaction, collections::USERNAMES, &previous.username)?;
        }
        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| commit_error(e, "Email or username is already in use"))?;

        Ok(())
    }

    /// Delete a user document and free its email and username.
    pub async fn delete_user(&self, user: &User) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.release_key(&mut transaction, collections::USER_EMAILS, &user.email)?;
        self.release_key(&mut transaction, collections::USERNAMES, &user.username)?;
        client
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(&user.id)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add deletion to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit user deletion: {}", e)))?;

        tracing::debug!(user_id = %user.id, "Deleted user document");
        Ok(())
    }

    /// One page of users ordered by account creation.
    pub async fn list_users(&self, options: &ListOptions) -> Result<Vec<User>, AppError> {
        self.list_by_created_at(collections::USERS, options).await
    }

    // ─── Post Operations ─────────────────────────────────────────

    /// Get a post by ID.
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::POSTS)
            .obj()
            .one(post_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up a post by its slug.
    pub async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, AppError> {
        let slug = slug.to_string();
        let posts: Vec<Post> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::POSTS)
            .filter(move |q| q.for_all([q.field("slug").eq(slug.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(posts.into_iter().next())
    }

    /// Store a new post, reserving its slug.
    pub async fn create_post(&self, post: &Post) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.reserve_key(&mut transaction, collections::POST_SLUGS, &post.slug, &post.id)?;
        client
            .fluent()
            .update()
            .in_col(collections::POSTS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&post.id)
            .object(post)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add post to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| commit_error(e, "A post with this title already exists"))?;

        tracing::debug!(post_id = %post.id, slug = %post.slug, "Created post");
        Ok(())
    }

    /// Replace an existing post document. The slug is never changed here.
    pub async fn update_post(&self, post: &Post) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::POSTS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&post.id)
            .object(post)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a post together with its comment thread and slug reservation.
    ///
    /// Returns the number of comments removed.
    pub async fn delete_post(&self, post: &Post) -> Result<usize, AppError> {
        let comments = self.get_post_comments(&post.id).await?;
        let count = comments.len();
        self.batch_delete(&comments, collections::COMMENTS, |comment: &Comment| {
            comment.id.clone()
        })
        .await?;

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.release_key(&mut transaction, collections::POST_SLUGS, &post.slug)?;
        client
            .fluent()
            .delete()
            .from(collections::POSTS)
            .document_id(&post.id)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add deletion to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit post deletion: {}", e)))?;

        tracing::debug!(post_id = %post.id, comments = count, "Deleted post and its comments");
        Ok(count)
    }

    /// Query posts ordered by last update.
    ///
    /// Equality filters run in Firestore. Firestore cannot do substring
    /// matching, so a search term is applied to the filtered result set here
    /// and the page is cut afterwards.
    pub async fn query_posts(
        &self,
        filter: &PostFilter,
        options: &ListOptions,
    ) -> Result<Vec<Post>, AppError> {
        let PostFilter {
            user_id,
            category,
            slug,
            post_id,
            search_term,
        } = filter.clone();

        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::POSTS)
            .filter(move |q| {
                q.for_all([
                    user_id.clone().and_then(|v| q.field("user_id").eq(v)),
                    category.clone().and_then(|v| q.field("category").eq(v)),
                    slug.clone().and_then(|v| q.field("slug").eq(v)),
                    post_id.clone().and_then(|v| q.field("id").eq(v)),
                ])
            })
            .order_by([("updated_at", FirestoreQueryDirection::from(options.direction))]);

        match search_term {
            None => query
                .offset(options.start_index)
                .limit(options.limit)
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Some(needle) => {
                let candidates: Vec<Post> = query
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                tracing::debug!(
                    candidates = candidates.len(),
                    search_term = %needle,
                    "Filtering posts by search term"
                );

                Ok(candidates
                    .into_iter()
                    .filter(|post| post.matches_search(&needle))
                    .skip(options.start_index as usize)
                    .take(options.limit as usize)
                    .collect())
            }
        }
    }

    // ─── Comment Operations ──────────────────────────────────────

    /// Get a comment by ID.
    pub async fn get_comment(&self, comment_id: &str) -> Result<Option<Comment>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COMMENTS)
            .obj()
            .one(comment_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace a comment document.
    pub async fn upsert_comment(&self, comment: &Comment) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COMMENTS)
            .document_id(&comment.id)
            .object(comment)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a comment document.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::COMMENTS)
            .document_id(comment_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All comments on a post, newest first.
    pub async fn get_post_comments(&self, post_id: &str) -> Result<Vec<Comment>, AppError> {
        let post_id = post_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COMMENTS)
            .filter(move |q| q.for_all([q.field("post_id").eq(post_id.clone())]))
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// One page of comments across all posts ordered by creation.
    pub async fn list_comments(&self, options: &ListOptions) -> Result<Vec<Comment>, AppError> {
        self.list_by_created_at(collections::COMMENTS, options).await
    }

    /// Toggle `user_id`'s like on a comment inside a transaction.
    ///
    /// The read happens in the transaction, so concurrent toggles on the same
    /// comment are retried instead of overwriting each other.
    /// Returns `None` if the comment does not exist.
    pub async fn toggle_comment_like(
        &self,
        comment_id: &str,
        user_id: &str,
    ) -> Result<Option<Comment>, AppError> {
        let comment_id = comment_id.to_string();
        let user_id = user_id.to_string();

        let updated = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let comment_id = comment_id.clone();
                let user_id = user_id.clone();
                Box::pin(async move {
                    let current: Option<Comment> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::COMMENTS)
                        .obj()
                        .one(&comment_id)
                        .await?;

                    let Some(mut comment) = current else {
                        return Ok::<_, BackoffError<FirestoreError>>(None);
                    };

                    let liked = comment.toggle_like(&user_id);

                    db.fluent()
                        .update()
                        .in_col(collections::COMMENTS)
                        .document_id(&comment_id)
                        .object(&comment)
                        .add_to_transaction(transaction)?;

                    tracing::debug!(
                        comment_id = %comment_id,
                        user_id = %user_id,
                        liked,
                        likes = comment.number_of_likes,
                        "Toggled comment like"
                    );

                    Ok(Some(comment))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Like transaction failed: {}", e)))?;

        Ok(updated)
    }
}
