//! Sort-key arithmetic for ordered ledger insertion.
//!
//! Movements are listed by `(date, sort_discriminator)`. New entries are
//! placed by key arithmetic alone, so no existing row is renumbered on the
//! happy path: keys are spaced [`DEFAULT_GAP`] apart and an insert between
//! two neighbours takes the midpoint of the open interval between their
//! keys. Renumbering happens only when a gap is exhausted, and only for the
//! movements sharing the anchor's date.
//!
//! The functions here are pure and synchronous; the engine decides when to
//! call them and how to act on a [`Placement::RebalanceNeeded`].

use serde::{Deserialize, Serialize};

/// Spacing reserved between adjacent sort keys.
pub const DEFAULT_GAP: i64 = 1000;

/// Policy for choosing the key of an entry inserted directly after an
/// anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertPolicy {
    /// `anchor + gap`, unconditionally.
    ///
    /// Never looks at the successor, so a burst of insertions at the same
    /// point can collide with or overtake the next entry's key. Collisions
    /// leave the relative order of the tied entries ambiguous but harmless.
    TrustGap,
    /// Midpoint of `(anchor, successor)` when a same-date successor exists,
    /// `anchor + gap` otherwise.
    ///
    /// When fewer than two keys fit between anchor and successor the
    /// placement reports [`Placement::RebalanceNeeded`] instead of emitting
    /// a duplicate or inverted key.
    Midpoint,
}

/// Where a newly inserted entry's key can go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Use this key as-is.
    At(i64),
    /// No key fits after the anchor; the date partition must be renumbered
    /// before the insert can be placed.
    RebalanceNeeded,
}

/// Key for the first entry when the table is empty.
#[must_use]
pub fn first_key(gap: i64) -> i64 {
    gap
}

/// Compute the key for an entry inserted directly after `anchor_key`.
///
/// `successor_key` is the key of the next entry *on the same date*, if any.
/// Ordering across different dates is carried by the date itself, so a
/// successor on a later date never constrains the new key and callers pass
/// `None` for it.
#[must_use]
pub fn place_after(
    anchor_key: i64,
    successor_key: Option<i64>,
    gap: i64,
    policy: InsertPolicy,
) -> Placement {
    match policy {
        InsertPolicy::TrustGap => gap_after(anchor_key, gap),
        InsertPolicy::Midpoint => match successor_key {
            None => gap_after(anchor_key, gap),
            Some(successor) => midpoint(anchor_key, successor),
        },
    }
}

/// `anchor + gap`, requesting a rebalance instead of wrapping on overflow.
fn gap_after(anchor_key: i64, gap: i64) -> Placement {
    match anchor_key.checked_add(gap) {
        Some(key) => Placement::At(key),
        None => Placement::RebalanceNeeded,
    }
}

/// Midpoint of the open interval `(anchor, successor)`.
fn midpoint(anchor_key: i64, successor_key: i64) -> Placement {
    debug_assert!(
        successor_key > anchor_key,
        "successor key must sort after the anchor"
    );
    match successor_key.checked_sub(anchor_key) {
        Some(span) if span >= 2 => Placement::At(anchor_key + span / 2),
        Some(_) => Placement::RebalanceNeeded,
        // Span exceeds i64: average the halves instead. Both halves round
        // toward zero, which keeps the result strictly inside the interval.
        None => Placement::At(anchor_key / 2 + successor_key / 2),
    }
}

/// Fresh keys for a renumbered partition of `len` entries: `gap, 2*gap, …`
/// in the entries' current order.
///
/// Returns `None` when `len * gap` does not fit in an `i64`, i.e. the key
/// space itself is exhausted for this gap.
#[must_use]
pub fn rebalanced_keys(len: usize, gap: i64) -> Option<Vec<i64>> {
    let mut keys = Vec::with_capacity(len);
    for position in 1..=len as i64 {
        keys.push(position.checked_mul(gap)?);
    }
    Some(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_key_is_one_gap() {
        assert_eq!(first_key(DEFAULT_GAP), 1000);
        assert_eq!(first_key(10), 10);
    }

    #[test]
    fn test_trust_gap_ignores_successor() {
        // A close successor does not stop the gap-trusting policy.
        assert_eq!(
            place_after(1000, Some(1001), DEFAULT_GAP, InsertPolicy::TrustGap),
            Placement::At(2000)
        );
        assert_eq!(
            place_after(1000, None, DEFAULT_GAP, InsertPolicy::TrustGap),
            Placement::At(2000)
        );
    }

    #[test]
    fn test_trust_gap_overflow_requests_rebalance() {
        assert_eq!(
            place_after(i64::MAX - 10, None, DEFAULT_GAP, InsertPolicy::TrustGap),
            Placement::RebalanceNeeded
        );
    }

    #[test]
    fn test_midpoint_without_successor_uses_gap() {
        assert_eq!(
            place_after(3000, None, DEFAULT_GAP, InsertPolicy::Midpoint),
            Placement::At(4000)
        );
    }

    #[test]
    fn test_midpoint_splits_interval() {
        assert_eq!(
            place_after(1000, Some(2000), DEFAULT_GAP, InsertPolicy::Midpoint),
            Placement::At(1500)
        );
        assert_eq!(
            place_after(1000, Some(1002), DEFAULT_GAP, InsertPolicy::Midpoint),
            Placement::At(1001)
        );
    }

    #[test]
    fn test_midpoint_exhausted_gap_requests_rebalance() {
        assert_eq!(
            place_after(1000, Some(1001), DEFAULT_GAP, InsertPolicy::Midpoint),
            Placement::RebalanceNeeded
        );
    }

    #[test]
    fn test_midpoint_survives_extreme_span() {
        // i64::MIN anchor with a positive successor overflows checked_sub;
        // the halved average must still land strictly inside the interval.
        let placed = place_after(
            i64::MIN + 1,
            Some(i64::MAX - 1),
            DEFAULT_GAP,
            InsertPolicy::Midpoint,
        );
        match placed {
            Placement::At(key) => {
                assert!(key > i64::MIN + 1);
                assert!(key < i64::MAX - 1);
            }
            Placement::RebalanceNeeded => panic!("expected a key for a wide interval"),
        }
    }

    #[test]
    fn test_midpoint_shrinks_until_rebalance() {
        // Repeated insertion right after the same anchor halves the gap
        // each time and must eventually request a rebalance, never emit a
        // duplicate key.
        let anchor = 1000;
        let mut successor = 2000;
        let mut seen = vec![anchor, successor];
        loop {
            match place_after(anchor, Some(successor), DEFAULT_GAP, InsertPolicy::Midpoint) {
                Placement::At(key) => {
                    assert!(key > anchor && key < successor);
                    assert!(!seen.contains(&key));
                    seen.push(key);
                    successor = key;
                }
                Placement::RebalanceNeeded => break,
            }
        }
        // gap of 1000 supports ~log2(1000) midpoint splits
        assert!(seen.len() >= 10);
    }

    #[test]
    fn test_rebalanced_keys_are_gap_spaced() {
        assert_eq!(rebalanced_keys(0, DEFAULT_GAP), Some(vec![]));
        assert_eq!(
            rebalanced_keys(4, DEFAULT_GAP),
            Some(vec![1000, 2000, 3000, 4000])
        );
    }

    #[test]
    fn test_rebalanced_keys_overflow_is_detected() {
        assert_eq!(rebalanced_keys(3, i64::MAX / 2), None);
    }
}
