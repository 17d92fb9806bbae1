//! End-to-end engine scenarios, run against both store backends.

use std::sync::Arc;

use homeledger::config::LedgerConfig;
use homeledger::input;
use homeledger::ledger::{LedgerEngine, LedgerError, MovementChanges, MovementId};
use homeledger::store::{MemoryStore, MovementStore, SqliteStore};
use homeledger::types::UserId;
use rust_decimal_macros::dec;

fn backends() -> Vec<Arc<dyn MovementStore>> {
    vec![
        Arc::new(MemoryStore::new()),
        Arc::new(SqliteStore::open_in_memory().expect("in-memory sqlite")),
    ]
}

#[tokio::test]
async fn fresh_ledger_counts_in_whole_gaps() {
    for store in backends() {
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        let user = UserId::new("alice");

        let first = engine.create_after(&user, None).await.unwrap();
        assert_eq!(first.sort_discriminator, 1000);
        assert_eq!(first.description, "new movement");
        assert_eq!(first.amount_in_cents, 0);

        let second = engine.create_after(&user, Some(&first.id)).await.unwrap();
        assert_eq!(second.sort_discriminator, 2000);

        let listed = engine.list(&user).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }
}

#[tokio::test]
async fn insert_after_last_movement_lists_last() {
    for store in backends() {
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        let user = UserId::new("alice");

        let mut last = engine.create_after(&user, None).await.unwrap();
        for _ in 0..4 {
            last = engine.create_after(&user, Some(&last.id)).await.unwrap();
        }

        let listed = engine.list(&user).await.unwrap();
        assert_eq!(listed.last().map(|m| m.id.clone()), Some(last.id));
    }
}

#[tokio::test]
async fn insert_between_neighbours_takes_the_midpoint() {
    for store in backends() {
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        let user = UserId::new("alice");

        let first = engine.create_after(&user, None).await.unwrap();
        let third = engine.create_after(&user, Some(&first.id)).await.unwrap();
        let second = engine.create_after(&user, Some(&first.id)).await.unwrap();

        assert_eq!(second.sort_discriminator, 1500);
        let ids: Vec<MovementId> = engine
            .list(&user)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }
}

#[tokio::test]
async fn listing_exposes_cents_and_display_amount_together() {
    for store in backends() {
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        let user = UserId::new("alice");

        let movement = engine.create_after(&user, None).await.unwrap();
        let cents = input::parse_amount("7947.64").unwrap();
        engine
            .update(
                &user,
                &movement.id,
                MovementChanges::default().with_amount_in_cents(cents),
            )
            .await
            .unwrap();

        let listed = engine.list(&user).await.unwrap();
        assert_eq!(listed[0].amount_in_cents, 794_764);
        assert_eq!(listed[0].amount, dec!(7947.64));
    }
}

#[tokio::test]
async fn date_change_reorders_without_touching_keys() {
    for store in backends() {
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        let user = UserId::new("alice");

        let a = engine.create_after(&user, None).await.unwrap();
        let b = engine.create_after(&user, Some(&a.id)).await.unwrap();

        // Same date so far: a before b by key. Move a past b by date alone.
        let later = b.date.succ_opt().unwrap();
        engine
            .update(
                &user,
                &a.id,
                MovementChanges::default().with_date(later),
            )
            .await
            .unwrap();

        let listed = engine.list(&user).await.unwrap();
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);
        assert_eq!(listed[0].sort_discriminator, b.sort_discriminator);
        assert_eq!(listed[1].sort_discriminator, a.sort_discriminator);
    }
}

#[tokio::test]
async fn delete_removes_exactly_one_and_perturbs_nothing() {
    for store in backends() {
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        let user = UserId::new("alice");

        let a = engine.create_after(&user, None).await.unwrap();
        let b = engine.create_after(&user, Some(&a.id)).await.unwrap();
        let c = engine.create_after(&user, Some(&b.id)).await.unwrap();

        engine.delete(&user, &b.id).await.unwrap();
        // Second delete of the same id is fine too.
        engine.delete(&user, &b.id).await.unwrap();

        let listed = engine.list(&user).await.unwrap();
        let keys: Vec<(MovementId, i64)> = listed
            .into_iter()
            .map(|m| (m.id, m.sort_discriminator))
            .collect();
        assert_eq!(
            keys,
            vec![
                (a.id, a.sort_discriminator),
                (c.id, c.sort_discriminator)
            ]
        );
    }
}

#[tokio::test]
async fn update_of_unknown_movement_is_not_found() {
    for store in backends() {
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        let user = UserId::new("alice");

        let err = engine
            .update(
                &user,
                &MovementId::new("no-such-row"),
                MovementChanges::default().with_description("x"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}

#[tokio::test]
async fn sqlite_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movements.db");
    let user = UserId::new("alice");

    let first_id;
    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        let first = engine.create_after(&user, None).await.unwrap();
        engine.create_after(&user, Some(&first.id)).await.unwrap();
        first_id = first.id;
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let engine = LedgerEngine::new(store, LedgerConfig::default());
    let listed = engine.list(&user).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first_id);

    // The reopened ledger keeps counting where it left off.
    let appended = engine
        .create_after(&user, Some(&listed[1].id))
        .await
        .unwrap();
    assert_eq!(appended.sort_discriminator, 3000);
}
