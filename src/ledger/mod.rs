//! Ledger movements: data model, sort-key arithmetic and the ordering
//! engine.
//!
//! - `movement` - the `Movement` record and its draft/patch/view shapes
//! - `ordering` - gap and midpoint key arithmetic
//! - `engine` - `LedgerEngine`, the operation surface over a `MovementStore`

pub mod engine;
pub mod movement;
pub mod ordering;

// Re-exports for convenience
pub use engine::{LedgerEngine, LedgerError};
pub use movement::{Movement, MovementChanges, MovementId, MovementView, NewMovement};
pub use ordering::{InsertPolicy, Placement, DEFAULT_GAP};
