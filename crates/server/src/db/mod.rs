//! Story and identity storage.
//!
//! Two traits form the storage seam:
//!
//! - [`StoryStore`] - story documents: list/search, CRUD, deduplicated upvote
//! - [`IdentityStore`] - users and pending magic-link tokens
//!
//! Each has a `PostgreSQL` implementation ([`PgStoryStore`],
//! [`PgIdentityStore`]) and both are implemented by [`InMemoryStore`].
//!
//! ## Tables
//!
//! - `stories` - Story documents, `upvoted_by` as `TEXT[]`
//! - `users` - Registered users (unique lowercased email)
//! - `verification_tokens` - Hashed magic-link tokens
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p sharerides-cli -- migrate
//! ```

pub mod memory;
pub mod stories;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use sharerides_core::{Email, PlateNumber, StoryId, ValidStory};

use crate::models::{NewStory, StoryRecord, User, VerificationToken};

pub use memory::InMemoryStore;
pub use stories::PgStoryStore;
pub use users::PgIdentityStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a lazily connected `PostgreSQL` pool.
///
/// No connection is opened until the first query. The pool is shared by the
/// whole process and must be closed with [`PgPool::close`] on shutdown.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection string cannot be parsed.
pub fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(database_url.expose_secret())
}

/// Filter for story listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryFilter {
    /// Exact match on the normalized plate.
    pub plate_number: Option<PlateNumber>,
}

/// Pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Page size. `None` returns every match after `skip`.
    pub limit: Option<u32>,
    pub skip: u32,
}

impl Page {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 50;

    /// Build a page. A `limit` of 0 means no limit.
    #[must_use]
    pub fn new(limit: u32, skip: u32) -> Self {
        Self {
            limit: (limit > 0).then_some(limit),
            skip,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}

/// Result of an upvote attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpvoteOutcome {
    /// The vote was counted; carries the updated story.
    Upvoted(StoryRecord),
    /// The voter had already upvoted; nothing changed.
    AlreadyUpvoted,
    /// No story with that id.
    NotFound,
}

/// Story document storage.
///
/// Every method is a single-document atomic operation. Listings are newest
/// first.
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Stories matching `filter` within `page`, plus the total match count.
    async fn list(
        &self,
        filter: &StoryFilter,
        page: Page,
    ) -> Result<(Vec<StoryRecord>, u64), RepositoryError>;

    async fn get(&self, id: StoryId) -> Result<Option<StoryRecord>, RepositoryError>;

    /// Insert a story with a fresh id, zero votes and current timestamps.
    async fn insert(&self, new: NewStory) -> Result<StoryRecord, RepositoryError>;

    /// Replace the editable fields. `None` if the story does not exist.
    async fn update(
        &self,
        id: StoryId,
        patch: &ValidStory,
    ) -> Result<Option<StoryRecord>, RepositoryError>;

    /// Delete a story. `false` if it did not exist.
    async fn delete(&self, id: StoryId) -> Result<bool, RepositoryError>;

    /// Count one vote from `voter`, at most once per story.
    ///
    /// The membership check and the increment happen atomically, so
    /// concurrent votes are neither lost nor double counted.
    async fn upvote(&self, id: StoryId, voter: &Email) -> Result<UpvoteOutcome, RepositoryError>;

    /// All stories owned by `email`, newest first.
    async fn list_by_owner(&self, email: &Email) -> Result<Vec<StoryRecord>, RepositoryError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// User and magic-link token storage.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Create a user whose email is verified now.
    ///
    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create_verified_user(&self, email: &Email) -> Result<User, RepositoryError>;

    /// Set `email_verified` if it is not already set.
    async fn mark_email_verified(&self, user: &User) -> Result<User, RepositoryError>;

    /// Store a new token, dropping any that have already expired.
    async fn store_verification_token(
        &self,
        token: &VerificationToken,
    ) -> Result<(), RepositoryError>;

    /// Remove and return the token matching `identifier` and `token_hash`.
    ///
    /// Removal and lookup are one step so a token can be redeemed once.
    async fn take_verification_token(
        &self,
        identifier: &Email,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limit() {
        assert_eq!(Page::new(500, 3), Page { limit: Some(500), skip: 3 });
        assert_eq!(Page::new(0, 2), Page { limit: None, skip: 2 });
        assert_eq!(Page::default(), Page { limit: Some(50), skip: 0 });
    }
}
