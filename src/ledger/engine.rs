//! Ledger Ordering Engine.
//!
//! Stateless service over a [`MovementStore`]: computes order keys for
//! inserts and forwards field updates and deletions. All state lives in
//! the store, so the engine clones cheaply and every operation is a single
//! logical unit of work. The one exception is a rebalance, which adds one
//! batch key rewrite before the insert.
//!
//! Every mutating operation takes the acting user and treats rows owned by
//! someone else the same as missing rows, so callers can never learn about
//! or touch another user's ledger through this surface.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{LedgerConfig, SeedScope};
use crate::ledger::movement::{Movement, MovementChanges, MovementId, MovementView, NewMovement};
use crate::ledger::ordering::{self, InsertPolicy, Placement};
use crate::store::{MovementStore, StoreError};
use crate::types::UserId;

/// Description given to freshly inserted movements until the user edits it.
const NEW_MOVEMENT_DESCRIPTION: &str = "new movement";

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Anchor or target movement does not exist for this user.
    #[error("movement not found: {0}")]
    NotFound(MovementId),

    /// The date partition cannot be renumbered without overflowing the
    /// key space. Needs on the order of 1e16 same-date rows to happen.
    #[error("sort key space exhausted for user {user_id} on {date}")]
    KeyspaceExhausted { user_id: UserId, date: NaiveDate },

    /// The persistence collaborator failed; propagated verbatim.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Ordering engine over a movement store.
///
/// Assigns sort keys so that a new entry can be placed directly after any
/// existing entry without renumbering the rest of the ledger, and keeps
/// `(date, sort_discriminator)` a strict total order per user.
#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn MovementStore>,
    config: LedgerConfig,
}

impl LedgerEngine {
    /// Create an engine with explicit configuration.
    pub fn new(store: Arc<dyn MovementStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Create an engine with the default (midpoint, per-user seed)
    /// configuration.
    pub fn with_defaults(store: Arc<dyn MovementStore>) -> Self {
        Self::new(store, LedgerConfig::default())
    }

    /// Insert a new movement directly after `anchor`.
    ///
    /// The new movement copies the anchor's date, belongs to `user`, and
    /// starts with a placeholder description and a zero amount. Without an
    /// anchor the most recently created movement (per the configured
    /// [`SeedScope`]) seeds the insertion; an empty table opens the key
    /// sequence at one gap.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] when the anchor is missing or owned by
    /// another user; store failures propagate unchanged.
    pub async fn create_after(
        &self,
        user: &UserId,
        anchor: Option<&MovementId>,
    ) -> Result<Movement, LedgerError> {
        let anchor_movement = match anchor {
            Some(id) => Some(self.owned_movement(user, id).await?),
            None => self.seed_anchor(user).await?,
        };

        let draft = match anchor_movement {
            Some(anchor) => {
                let key = self.key_after(user, &anchor).await?;
                NewMovement {
                    user_id: user.clone(),
                    description: NEW_MOVEMENT_DESCRIPTION.to_string(),
                    date: anchor.date,
                    amount_in_cents: 0,
                    sort_discriminator: key,
                }
            }
            // Empty table: the first entry opens the key sequence today.
            None => NewMovement {
                user_id: user.clone(),
                description: NEW_MOVEMENT_DESCRIPTION.to_string(),
                date: Utc::now().date_naive(),
                amount_in_cents: 0,
                sort_discriminator: ordering::first_key(self.config.gap),
            },
        };

        let movement = self.store.insert(draft).await?;
        info!(
            movement_id = %movement.id,
            user_id = %movement.user_id,
            date = %movement.date,
            sort_discriminator = movement.sort_discriminator,
            "Movement created"
        );
        Ok(movement)
    }

    /// Apply a partial field update to a movement owned by `user`.
    ///
    /// Only `description`, `date` and `amount_in_cents` are reachable;
    /// `sort_discriminator`, `id`, `user_id` and `created_at` are never
    /// altered by this path.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] when the id is missing or owned by
    /// another user.
    pub async fn update(
        &self,
        user: &UserId,
        id: &MovementId,
        changes: MovementChanges,
    ) -> Result<Movement, LedgerError> {
        let current = self.owned_movement(user, id).await?;
        if changes.is_empty() {
            debug!(movement_id = %id, "Update with no fields - nothing to do");
            return Ok(current);
        }

        let updated = self
            .store
            .update(id, changes)
            .await?
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        info!(movement_id = %id, user_id = %user, "Movement updated");
        Ok(updated)
    }

    /// Remove a movement owned by `user`.
    ///
    /// Idempotent: a missing id (or one owned by someone else) is a silent
    /// no-op, never an error. Surviving movements keep their keys.
    pub async fn delete(&self, user: &UserId, id: &MovementId) -> Result<(), LedgerError> {
        match self.store.find_by_id(id).await? {
            None => {
                debug!(movement_id = %id, "Delete of unknown movement ignored");
                Ok(())
            }
            Some(movement) if movement.user_id != *user => {
                warn!(movement_id = %id, user_id = %user, "Delete of foreign movement ignored");
                Ok(())
            }
            Some(_) => {
                self.store.delete(id).await?;
                info!(movement_id = %id, user_id = %user, "Movement deleted");
                Ok(())
            }
        }
    }

    /// All movements of `user` in ledger order, as presentation views.
    pub async fn list(&self, user: &UserId) -> Result<Vec<MovementView>, LedgerError> {
        let movements = self.store.list_by_user(user).await?;
        Ok(movements.into_iter().map(MovementView::from).collect())
    }

    /// Fetch a movement and verify `user` owns it. Foreign rows report
    /// `NotFound` so existence is not leaked across users.
    async fn owned_movement(
        &self,
        user: &UserId,
        id: &MovementId,
    ) -> Result<Movement, LedgerError> {
        let movement = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        if movement.user_id != *user {
            warn!(movement_id = %id, user_id = %user, "Cross-user movement access refused");
            return Err(LedgerError::NotFound(id.clone()));
        }
        Ok(movement)
    }

    /// Seed anchor for an insert without an explicit anchor.
    async fn seed_anchor(&self, user: &UserId) -> Result<Option<Movement>, LedgerError> {
        let scope = match self.config.seed_scope {
            SeedScope::PerUser => Some(user),
            SeedScope::Global => None,
        };
        Ok(self.store.find_most_recent(scope).await?)
    }

    /// Compute the key for an entry inserted after `anchor` into `user`'s
    /// ledger, rebalancing the date partition when no key fits.
    async fn key_after(&self, user: &UserId, anchor: &Movement) -> Result<i64, LedgerError> {
        // The gap-trusting policy never looks at the successor, so skip
        // the extra read in that mode.
        let successor = match self.config.insert_policy {
            InsertPolicy::Midpoint => {
                self.store
                    .find_successor(user, anchor.date, anchor.sort_discriminator)
                    .await?
            }
            InsertPolicy::TrustGap => None,
        };

        match ordering::place_after(
            anchor.sort_discriminator,
            successor.map(|s| s.sort_discriminator),
            self.config.gap,
            self.config.insert_policy,
        ) {
            Placement::At(key) => Ok(key),
            Placement::RebalanceNeeded => self.rebalance_and_place(user, anchor).await,
        }
    }

    /// Renumber `user`'s movements on the anchor's date at gap spacing in
    /// one batch, then place the new key after the anchor again.
    async fn rebalance_and_place(
        &self,
        user: &UserId,
        anchor: &Movement,
    ) -> Result<i64, LedgerError> {
        let partition: Vec<Movement> = self
            .store
            .list_by_user(user)
            .await?
            .into_iter()
            .filter(|m| m.date == anchor.date)
            .collect();

        let keys = ordering::rebalanced_keys(partition.len(), self.config.gap).ok_or_else(|| {
            LedgerError::KeyspaceExhausted {
                user_id: user.clone(),
                date: anchor.date,
            }
        })?;

        let updates: Vec<(MovementId, i64)> = partition
            .iter()
            .zip(&keys)
            .map(|(movement, &key)| (movement.id.clone(), key))
            .collect();
        self.store.apply_sort_discriminators(&updates).await?;
        warn!(
            user_id = %user,
            date = %anchor.date,
            rows = updates.len(),
            "Sort keys rebalanced"
        );

        // The partition was just renumbered, so the anchor's neighbours
        // are known without another read. An anchor outside the partition
        // (a seed from another user's ledger) appends after the last key.
        let (anchor_key, successor_key) = match partition.iter().position(|m| m.id == anchor.id) {
            Some(index) => (keys[index], keys.get(index + 1).copied()),
            None => (keys.last().copied().unwrap_or(0), None),
        };

        match ordering::place_after(
            anchor_key,
            successor_key,
            self.config.gap,
            self.config.insert_policy,
        ) {
            Placement::At(key) => Ok(key),
            // Freshly spaced keys still leave no room: the gap itself is
            // too small to ever split.
            Placement::RebalanceNeeded => Err(LedgerError::KeyspaceExhausted {
                user_id: user.clone(),
                date: anchor.date,
            }),
        }
    }
}
