//! Database layer (Firestore).

pub mod firestore;
pub mod query;

pub use firestore::FirestoreDb;
pub use query::{ListOptions, PostFilter, SortDirection};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";

    /// Reservation documents keeping emails, usernames and slugs unique.
    pub const USER_EMAILS: &str = "user_emails";
    pub const USERNAMES: &str = "usernames";
    pub const POST_SLUGS: &str = "post_slugs";
}
