//! Blog post management.
//!
//! CRUD over a [`PostStore`]. Unlike movement deletion, deleting a missing
//! post is an error: post removal is an explicit editorial action, not a
//! repeatable form submission.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::posts::post::{Post, PostChanges, PostDraft, PostId};
use crate::store::{PostStore, StoreError};
use crate::types::UserId;

/// Errors that can occur during post operations.
#[derive(Debug, Error)]
pub enum PostError {
    /// Target post does not exist for this user.
    #[error("post not found: {0}")]
    NotFound(PostId),

    /// The persistence collaborator failed; propagated verbatim.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Post management service over a post store.
#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn PostStore>,
}

impl PostService {
    /// Create a service over the given store.
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    /// Create a post owned by `user`.
    pub async fn create(
        &self,
        user: &UserId,
        title: String,
        body: String,
    ) -> Result<Post, PostError> {
        let post = self
            .store
            .insert(PostDraft {
                user_id: user.clone(),
                title,
                body,
            })
            .await?;
        info!(post_id = %post.id, user_id = %user, "Post created");
        Ok(post)
    }

    /// Look up a post by id.
    ///
    /// # Errors
    ///
    /// [`PostError::NotFound`] when the id does not exist.
    pub async fn find(&self, id: &PostId) -> Result<Post, PostError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| PostError::NotFound(id.clone()))
    }

    /// Apply a partial field update to a post owned by `user`.
    ///
    /// # Errors
    ///
    /// [`PostError::NotFound`] when the id is missing or owned by another
    /// user.
    pub async fn update(
        &self,
        user: &UserId,
        id: &PostId,
        changes: PostChanges,
    ) -> Result<Post, PostError> {
        self.owned_post(user, id).await?;
        let updated = self
            .store
            .update(id, changes)
            .await?
            .ok_or_else(|| PostError::NotFound(id.clone()))?;
        info!(post_id = %id, user_id = %user, "Post updated");
        Ok(updated)
    }

    /// Delete a post owned by `user`.
    ///
    /// # Errors
    ///
    /// [`PostError::NotFound`] when the id is missing or owned by another
    /// user.
    pub async fn delete(&self, user: &UserId, id: &PostId) -> Result<(), PostError> {
        self.owned_post(user, id).await?;
        if !self.store.delete(id).await? {
            return Err(PostError::NotFound(id.clone()));
        }
        info!(post_id = %id, user_id = %user, "Post deleted");
        Ok(())
    }

    /// All posts, newest first.
    pub async fn list(&self) -> Result<Vec<Post>, PostError> {
        Ok(self.store.list().await?)
    }

    /// Fetch a post and verify `user` owns it.
    async fn owned_post(&self, user: &UserId, id: &PostId) -> Result<Post, PostError> {
        let post = self.find(id).await?;
        if post.user_id != *user {
            warn!(post_id = %id, user_id = %user, "Cross-user post access refused");
            return Err(PostError::NotFound(id.clone()));
        }
        Ok(post)
    }
}
