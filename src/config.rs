//! Ledger engine configuration.
//!
//! The two behaviors the engine could otherwise pick silently are explicit
//! configuration here: how new keys relate to their neighbours, and where
//! the seed anchor comes from when an insert has no anchor.

use serde::{Deserialize, Serialize};

use crate::ledger::ordering::{InsertPolicy, DEFAULT_GAP};

/// Scope of the seed-anchor lookup used when `create_after` is called
/// without an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedScope {
    /// Most recently created movement across the whole table, regardless
    /// of owner. With more than one user the seed can come from someone
    /// else's ledger; kept available for compatibility.
    Global,
    /// Most recently created movement of the acting user.
    PerUser,
}

/// Configuration for the ledger ordering engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Spacing reserved between adjacent sort keys. Values below 2 leave
    /// no room for midpoint insertion and force a rebalance on every
    /// same-date insert.
    pub gap: i64,
    /// How a new key is chosen next to existing neighbours.
    pub insert_policy: InsertPolicy,
    /// Where the seed anchor comes from when no anchor is given.
    pub seed_scope: SeedScope,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            gap: DEFAULT_GAP,
            insert_policy: InsertPolicy::Midpoint,
            seed_scope: SeedScope::PerUser,
        }
    }
}

impl LedgerConfig {
    /// Gap-trusting configuration: every new key is `anchor + gap` with no
    /// successor check, and the seed anchor is the newest movement
    /// table-wide.
    #[must_use]
    pub fn trusting() -> Self {
        Self {
            gap: DEFAULT_GAP,
            insert_policy: InsertPolicy::TrustGap,
            seed_scope: SeedScope::Global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_hardened() {
        let config = LedgerConfig::default();
        assert_eq!(config.gap, 1000);
        assert_eq!(config.insert_policy, InsertPolicy::Midpoint);
        assert_eq!(config.seed_scope, SeedScope::PerUser);
    }

    #[test]
    fn test_trusting_matches_gap_arithmetic() {
        let config = LedgerConfig::trusting();
        assert_eq!(config.insert_policy, InsertPolicy::TrustGap);
        assert_eq!(config.seed_scope, SeedScope::Global);
    }
}
