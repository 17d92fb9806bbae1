//! Data model for ledger movements.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Opaque movement identifier (store-assigned, never reused).
///
/// Newtype wrapper to prevent accidentally mixing movement ids with other
/// string types at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementId(String);

impl MovementId {
    /// Create a new MovementId from any string-like type.
    ///
    /// # Panics
    ///
    /// Debug builds will panic if the ID is empty. Release builds log a warning.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let s: String = id.into();
        debug_assert!(!s.is_empty(), "MovementId cannot be empty");
        if s.is_empty() {
            tracing::warn!("Creating MovementId with empty string - lookups will never match");
        }
        Self(s)
    }

    /// Get the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner String.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for MovementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MovementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MovementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for MovementId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One ledger entry: a dated, described, signed monetary amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Store-assigned identifier, immutable.
    pub id: MovementId,
    /// Owning user. A movement has exactly one owner and is never reassigned.
    pub user_id: UserId,
    /// Free-text label.
    pub description: String,
    /// Calendar date the entry belongs to (not a timestamp).
    pub date: NaiveDate,
    /// Signed amount in minor currency units. The single authoritative
    /// representation; display values are derived from it and never fed
    /// back into storage.
    pub amount_in_cents: i64,
    /// Order key within a date. Assigned at creation and touched only by
    /// the insertion/rebalance algorithm, never by field updates.
    pub sort_discriminator: i64,
    /// Assigned by the store at insert. Used only to find the most
    /// recently created entry when an insert has no anchor.
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Major-unit display amount (`amount_in_cents / 100`).
    ///
    /// Lossy by design; for display only. Arithmetic and storage always go
    /// through `amount_in_cents`.
    #[must_use]
    pub fn display_amount(&self) -> Decimal {
        Decimal::new(self.amount_in_cents, 2)
    }
}

/// Fields of a movement about to be inserted.
///
/// The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub user_id: UserId,
    pub description: String,
    pub date: NaiveDate,
    pub amount_in_cents: i64,
    pub sort_discriminator: i64,
}

/// Partial field update for an existing movement.
///
/// The sort discriminator is deliberately absent: field updates can never
/// reach it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementChanges {
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount_in_cents: Option<i64>,
}

impl MovementChanges {
    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the date.
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the amount in minor units.
    #[must_use]
    pub fn with_amount_in_cents(mut self, cents: i64) -> Self {
        self.amount_in_cents = Some(cents);
        self
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.date.is_none() && self.amount_in_cents.is_none()
    }
}

/// Presentation shape for listings.
///
/// Exposes the authoritative minor-unit amount and the derived major-unit
/// amount side by side. Only `amount_in_cents` may be used for further
/// computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementView {
    pub id: MovementId,
    pub description: String,
    pub date: NaiveDate,
    /// Derived display amount, two decimal places.
    pub amount: Decimal,
    pub amount_in_cents: i64,
    pub sort_discriminator: i64,
}

impl From<Movement> for MovementView {
    fn from(movement: Movement) -> Self {
        Self {
            amount: movement.display_amount(),
            id: movement.id,
            description: movement.description,
            date: movement.date,
            amount_in_cents: movement.amount_in_cents,
            sort_discriminator: movement.sort_discriminator,
        }
    }
}
