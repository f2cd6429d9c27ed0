// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Listing options and filters shared by the query operations.

/// Page size used when the client does not ask for one.
pub const DEFAULT_LIMIT: u32 = 9;
/// Upper bound on a single page.
pub const MAX_LIMIT: u32 = 100;

/// Sort direction on the listing's timestamp field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Parse an `asc`/`desc` query parameter, falling back to `default`
    /// for anything else (including absence).
    pub fn from_param(value: Option<&str>, default: SortDirection) -> Self {
        match value.map(str::trim) {
            Some("asc") => SortDirection::Ascending,
            Some("desc") => SortDirection::Descending,
            _ => default,
        }
    }
}

impl From<SortDirection> for firestore::FirestoreQueryDirection {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Ascending => firestore::FirestoreQueryDirection::Ascending,
            SortDirection::Descending => firestore::FirestoreQueryDirection::Descending,
        }
    }
}

/// Offset-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// Number of matching records to skip
    pub start_index: u32,
    /// Maximum number of records to return (1..=MAX_LIMIT)
    pub limit: u32,
    pub direction: SortDirection,
}

impl ListOptions {
    pub fn new(start_index: Option<u32>, limit: Option<u32>, direction: SortDirection) -> Self {
        Self {
            start_index: start_index.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            direction,
        }
    }
}

/// Filters accepted by the post listing. All set filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub user_id: Option<String>,
    pub category: Option<String>,
    pub slug: Option<String>,
    pub post_id: Option<String>,
    /// Case-insensitive substring of the title or content, stored lowercased
    pub search_term: Option<String>,
}

impl PostFilter {
    /// Drop blank values (the client sends `category=` for "any") and
    /// lowercase the search term.
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            user_id: keep(self.user_id),
            category: keep(self.category),
            slug: keep(self.slug),
            post_id: keep(self.post_id),
            search_term: keep(self.search_term).map(|s| s.to_lowercase()),
        }
    }
}
