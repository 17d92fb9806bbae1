//! Persistence interface for movements and posts.
//!
//! Provides pluggable store backends behind async traits:
//! - [`MemoryStore`] - in-memory maps (tests, development)
//! - [`SqliteStore`] - durable SQLite persistence
//!
//! The stores are deliberately thin: create/read/update/delete plus the
//! ordered retrievals the domain needs. Key computation, ownership checks
//! and input validation all live above these traits. Listings order by
//! `(date, sort_discriminator)` and break ties by id, so results stay
//! deterministic even if concurrent inserts ever produce duplicate keys.

pub mod memory;
pub mod sqlite;

// Re-exports for convenience
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::ledger::movement::{Movement, MovementChanges, MovementId, NewMovement};
use crate::posts::post::{Post, PostChanges, PostDraft, PostId};
use crate::types::UserId;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure reaching the backing storage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQL-level failure (connectivity, constraint violation)
    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A persisted row could not be decoded
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Persistence contract for ledger movements.
///
/// Implementations assign `id` and `created_at` on insert and are trusted
/// to keep ids unique. All retrievals that return sequences are ordered.
#[async_trait]
pub trait MovementStore: Send + Sync {
    /// Look up a movement by id.
    async fn find_by_id(&self, id: &MovementId) -> Result<Option<Movement>, StoreError>;

    /// Most recently created movement, scoped to `user` when given,
    /// table-wide otherwise. `None` when the scope is empty.
    async fn find_most_recent(&self, user: Option<&UserId>) -> Result<Option<Movement>, StoreError>;

    /// Persist a new movement, assigning `id` and `created_at`.
    async fn insert(&self, draft: NewMovement) -> Result<Movement, StoreError>;

    /// Apply a partial field update. Returns the updated movement, or
    /// `None` if the id does not exist.
    async fn update(
        &self,
        id: &MovementId,
        changes: MovementChanges,
    ) -> Result<Option<Movement>, StoreError>;

    /// Remove a movement. Succeeds silently if the id does not exist.
    async fn delete(&self, id: &MovementId) -> Result<(), StoreError>;

    /// All movements of `user`, ordered by `(date asc, sort_discriminator
    /// asc)`.
    async fn list_by_user(&self, user: &UserId) -> Result<Vec<Movement>, StoreError>;

    /// First movement of `user` on `date` with a key strictly greater than
    /// `after` - the entry a same-date insert could collide with.
    async fn find_successor(
        &self,
        user: &UserId,
        date: NaiveDate,
        after: i64,
    ) -> Result<Option<Movement>, StoreError>;

    /// Overwrite the sort keys of the given movements in one batch.
    ///
    /// Used only by rebalancing. Ids that no longer exist are skipped.
    async fn apply_sort_discriminators(
        &self,
        updates: &[(MovementId, i64)],
    ) -> Result<(), StoreError>;
}

/// Persistence contract for blog posts.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Look up a post by id.
    async fn find_by_id(&self, id: &PostId) -> Result<Option<Post>, StoreError>;

    /// Persist a new post, assigning `id` and both timestamps.
    async fn insert(&self, draft: PostDraft) -> Result<Post, StoreError>;

    /// Apply a partial field update and refresh `updated_at`. Returns the
    /// updated post, or `None` if the id does not exist.
    async fn update(&self, id: &PostId, changes: PostChanges) -> Result<Option<Post>, StoreError>;

    /// Remove a post. Returns whether a row existed.
    async fn delete(&self, id: &PostId) -> Result<bool, StoreError>;

    /// All posts, newest first.
    async fn list(&self) -> Result<Vec<Post>, StoreError>;
}
