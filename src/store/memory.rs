//! In-memory store for tests and development.
//!
//! Plain maps behind `RwLock`s; nothing survives the process. Creation
//! timestamps are nudged forward when the wall clock does not move between
//! back-to-back inserts, so "most recently created" stays well defined.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{MovementStore, PostStore, StoreError};
use crate::ledger::movement::{Movement, MovementChanges, MovementId, NewMovement};
use crate::posts::post::{Post, PostChanges, PostDraft, PostId};
use crate::types::UserId;

/// In-memory implementation of both store traits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    movements: Arc<RwLock<HashMap<MovementId, Movement>>>,
    posts: Arc<RwLock<HashMap<PostId, Post>>>,
    last_created: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strictly monotonic creation timestamp.
    ///
    /// Wall-clock resolution does not order back-to-back inserts; nudge
    /// one nanosecond past the previous timestamp when it would tie.
    async fn next_created_at(&self) -> DateTime<Utc> {
        let mut last = self.last_created.lock().await;
        let mut now = Utc::now();
        if let Some(previous) = *last {
            if now <= previous {
                now = previous + Duration::nanoseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

#[async_trait]
impl MovementStore for MemoryStore {
    async fn find_by_id(&self, id: &MovementId) -> Result<Option<Movement>, StoreError> {
        let movements = self.movements.read().await;
        Ok(movements.get(id).cloned())
    }

    async fn find_most_recent(&self, user: Option<&UserId>) -> Result<Option<Movement>, StoreError> {
        let movements = self.movements.read().await;
        Ok(movements
            .values()
            .filter(|m| user.is_none_or(|u| m.user_id == *u))
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.as_str().cmp(b.id.as_str()))
            })
            .cloned())
    }

    async fn insert(&self, draft: NewMovement) -> Result<Movement, StoreError> {
        let movement = Movement {
            id: MovementId::new(Uuid::new_v4().to_string()),
            user_id: draft.user_id,
            description: draft.description,
            date: draft.date,
            amount_in_cents: draft.amount_in_cents,
            sort_discriminator: draft.sort_discriminator,
            created_at: self.next_created_at().await,
        };
        let mut movements = self.movements.write().await;
        movements.insert(movement.id.clone(), movement.clone());
        Ok(movement)
    }

    async fn update(
        &self,
        id: &MovementId,
        changes: MovementChanges,
    ) -> Result<Option<Movement>, StoreError> {
        let mut movements = self.movements.write().await;
        Ok(movements.get_mut(id).map(|movement| {
            if let Some(description) = changes.description {
                movement.description = description;
            }
            if let Some(date) = changes.date {
                movement.date = date;
            }
            if let Some(cents) = changes.amount_in_cents {
                movement.amount_in_cents = cents;
            }
            movement.clone()
        }))
    }

    async fn delete(&self, id: &MovementId) -> Result<(), StoreError> {
        let mut movements = self.movements.write().await;
        movements.remove(id);
        Ok(())
    }

    async fn list_by_user(&self, user: &UserId) -> Result<Vec<Movement>, StoreError> {
        let movements = self.movements.read().await;
        let mut rows: Vec<Movement> = movements
            .values()
            .filter(|m| m.user_id == *user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.sort_discriminator.cmp(&b.sort_discriminator))
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(rows)
    }

    async fn find_successor(
        &self,
        user: &UserId,
        date: NaiveDate,
        after: i64,
    ) -> Result<Option<Movement>, StoreError> {
        let movements = self.movements.read().await;
        Ok(movements
            .values()
            .filter(|m| m.user_id == *user && m.date == date && m.sort_discriminator > after)
            .min_by(|a, b| {
                a.sort_discriminator
                    .cmp(&b.sort_discriminator)
                    .then_with(|| a.id.as_str().cmp(b.id.as_str()))
            })
            .cloned())
    }

    async fn apply_sort_discriminators(
        &self,
        updates: &[(MovementId, i64)],
    ) -> Result<(), StoreError> {
        let mut movements = self.movements.write().await;
        for (id, key) in updates {
            if let Some(movement) = movements.get_mut(id) {
                movement.sort_discriminator = *key;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn find_by_id(&self, id: &PostId) -> Result<Option<Post>, StoreError> {
        let posts = self.posts.read().await;
        Ok(posts.get(id).cloned())
    }

    async fn insert(&self, draft: PostDraft) -> Result<Post, StoreError> {
        let now = self.next_created_at().await;
        let post = Post {
            id: PostId::new(Uuid::new_v4().to_string()),
            user_id: draft.user_id,
            title: draft.title,
            body: draft.body,
            created_at: now,
            updated_at: now,
        };
        let mut posts = self.posts.write().await;
        posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    async fn update(&self, id: &PostId, changes: PostChanges) -> Result<Option<Post>, StoreError> {
        let mut posts = self.posts.write().await;
        Ok(posts.get_mut(id).map(|post| {
            if let Some(title) = changes.title {
                post.title = title;
            }
            if let Some(body) = changes.body {
                post.body = body;
            }
            post.updated_at = Utc::now();
            post.clone()
        }))
    }

    async fn delete(&self, id: &PostId) -> Result<bool, StoreError> {
        let mut posts = self.posts.write().await;
        Ok(posts.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<Post>, StoreError> {
        let posts = self.posts.read().await;
        let mut rows: Vec<Post> = posts.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        Ok(rows)
    }
}
