//! SQLite-backed store.
//!
//! Single-connection store behind a mutex; statements run on the blocking
//! thread pool so queries never stall the async runtime. Ids are UUID
//! text, dates ISO-8601 text, timestamps RFC 3339 text.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{MovementStore, PostStore, StoreError};
use crate::ledger::movement::{Movement, MovementChanges, MovementId, NewMovement};
use crate::posts::post::{Post, PostChanges, PostDraft, PostId};
use crate::types::UserId;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS movements (
    id                 TEXT PRIMARY KEY,
    user_id            TEXT NOT NULL,
    description        TEXT NOT NULL,
    date               TEXT NOT NULL,
    amount_in_cents    INTEGER NOT NULL,
    sort_discriminator INTEGER NOT NULL,
    created_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS movements_user_order
    ON movements (user_id, date, sort_discriminator);
CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

const MOVEMENT_COLUMNS: &str =
    "id, user_id, description, date, amount_in_cents, sort_discriminator, created_at";
const POST_COLUMNS: &str = "id, user_id, title, body, created_at, updated_at";

/// SQLite implementation of both store traits.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (and bootstrap) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database. Each call gets a fresh one.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            // Tolerate poisoning: the connection itself is still usable.
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            op(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

fn movement_from_row(row: &Row<'_>) -> rusqlite::Result<Movement> {
    Ok(Movement {
        id: MovementId::new(row.get::<_, String>(0)?),
        user_id: UserId::new(row.get::<_, String>(1)?),
        description: row.get(2)?,
        date: row.get(3)?,
        amount_in_cents: row.get(4)?,
        sort_discriminator: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId::new(row.get::<_, String>(0)?),
        user_id: UserId::new(row.get::<_, String>(1)?),
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn movement_by_id(conn: &Connection, id: &str) -> Result<Option<Movement>, StoreError> {
    let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM movements WHERE id = ?1");
    let movement = conn
        .query_row(&sql, params![id], movement_from_row)
        .optional()?;
    Ok(movement)
}

fn post_by_id(conn: &Connection, id: &str) -> Result<Option<Post>, StoreError> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
    let post = conn.query_row(&sql, params![id], post_from_row).optional()?;
    Ok(post)
}

#[async_trait]
impl MovementStore for SqliteStore {
    async fn find_by_id(&self, id: &MovementId) -> Result<Option<Movement>, StoreError> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| movement_by_id(conn, &id)).await
    }

    async fn find_most_recent(&self, user: Option<&UserId>) -> Result<Option<Movement>, StoreError> {
        let user = user.map(|u| u.as_str().to_string());
        self.with_conn(move |conn| {
            // Ties on created_at fall back to id so the pick is stable.
            let movement = match user {
                Some(user) => conn
                    .query_row(
                        &format!(
                            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE user_id = ?1 \
                             ORDER BY created_at DESC, id DESC LIMIT 1"
                        ),
                        params![user],
                        movement_from_row,
                    )
                    .optional()?,
                None => conn
                    .query_row(
                        &format!(
                            "SELECT {MOVEMENT_COLUMNS} FROM movements \
                             ORDER BY created_at DESC, id DESC LIMIT 1"
                        ),
                        [],
                        movement_from_row,
                    )
                    .optional()?,
            };
            Ok(movement)
        })
        .await
    }

    async fn insert(&self, draft: NewMovement) -> Result<Movement, StoreError> {
        self.with_conn(move |conn| {
            let movement = Movement {
                id: MovementId::new(Uuid::new_v4().to_string()),
                user_id: draft.user_id,
                description: draft.description,
                date: draft.date,
                amount_in_cents: draft.amount_in_cents,
                sort_discriminator: draft.sort_discriminator,
                created_at: Utc::now(),
            };
            conn.execute(
                "INSERT INTO movements (id, user_id, description, date, amount_in_cents, \
                 sort_discriminator, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    movement.id.as_str(),
                    movement.user_id.as_str(),
                    movement.description,
                    movement.date,
                    movement.amount_in_cents,
                    movement.sort_discriminator,
                    movement.created_at,
                ],
            )?;
            Ok(movement)
        })
        .await
    }

    async fn update(
        &self,
        id: &MovementId,
        changes: MovementChanges,
    ) -> Result<Option<Movement>, StoreError> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            if let Some(description) = changes.description {
                sets.push("description = ?");
                values.push(Value::Text(description));
            }
            if let Some(date) = changes.date {
                sets.push("date = ?");
                values.push(Value::Text(date.format("%Y-%m-%d").to_string()));
            }
            if let Some(cents) = changes.amount_in_cents {
                sets.push("amount_in_cents = ?");
                values.push(Value::Integer(cents));
            }
            if !sets.is_empty() {
                let sql = format!("UPDATE movements SET {} WHERE id = ?", sets.join(", "));
                values.push(Value::Text(id.clone()));
                conn.execute(&sql, params_from_iter(values.iter()))?;
            }
            movement_by_id(conn, &id)
        })
        .await
    }

    async fn delete(&self, id: &MovementId) -> Result<(), StoreError> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM movements WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    async fn list_by_user(&self, user: &UserId) -> Result<Vec<Movement>, StoreError> {
        let user = user.as_str().to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE user_id = ?1 \
                 ORDER BY date ASC, sort_discriminator ASC, id ASC"
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params![user], movement_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn find_successor(
        &self,
        user: &UserId,
        date: NaiveDate,
        after: i64,
    ) -> Result<Option<Movement>, StoreError> {
        let user = user.as_str().to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {MOVEMENT_COLUMNS} FROM movements \
                 WHERE user_id = ?1 AND date = ?2 AND sort_discriminator > ?3 \
                 ORDER BY sort_discriminator ASC, id ASC LIMIT 1"
            );
            let movement = conn
                .query_row(&sql, params![user, date, after], movement_from_row)
                .optional()?;
            Ok(movement)
        })
        .await
    }

    async fn apply_sort_discriminators(
        &self,
        updates: &[(MovementId, i64)],
    ) -> Result<(), StoreError> {
        let updates: Vec<(String, i64)> = updates
            .iter()
            .map(|(id, key)| (id.as_str().to_string(), *key))
            .collect();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx
                    .prepare_cached("UPDATE movements SET sort_discriminator = ?1 WHERE id = ?2")?;
                for (id, key) in &updates {
                    stmt.execute(params![key, id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn find_by_id(&self, id: &PostId) -> Result<Option<Post>, StoreError> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| post_by_id(conn, &id)).await
    }

    async fn insert(&self, draft: PostDraft) -> Result<Post, StoreError> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            let post = Post {
                id: PostId::new(Uuid::new_v4().to_string()),
                user_id: draft.user_id,
                title: draft.title,
                body: draft.body,
                created_at: now,
                updated_at: now,
            };
            conn.execute(
                "INSERT INTO posts (id, user_id, title, body, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    post.id.as_str(),
                    post.user_id.as_str(),
                    post.title,
                    post.body,
                    post.created_at,
                    post.updated_at,
                ],
            )?;
            Ok(post)
        })
        .await
    }

    async fn update(&self, id: &PostId, changes: PostChanges) -> Result<Option<Post>, StoreError> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| {
            if !changes.is_empty() {
                let now = Utc::now();
                if let Some(title) = changes.title {
                    conn.execute(
                        "UPDATE posts SET title = ?1, updated_at = ?2 WHERE id = ?3",
                        params![title, now, id],
                    )?;
                }
                if let Some(body) = changes.body {
                    conn.execute(
                        "UPDATE posts SET body = ?1, updated_at = ?2 WHERE id = ?3",
                        params![body, now, id],
                    )?;
                }
            }
            post_by_id(conn, &id)
        })
        .await
    }

    async fn delete(&self, id: &PostId) -> Result<bool, StoreError> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| {
            let affected = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Post>, StoreError> {
        self.with_conn(move |conn| {
            let sql =
                format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC");
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map([], post_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(user: &str, date: NaiveDate, key: i64) -> NewMovement {
        NewMovement {
            user_id: UserId::new(user),
            description: "test".to_string(),
            date,
            amount_in_cents: 0,
            sort_discriminator: key,
        }
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_all_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2021, 3, 5).unwrap();

        let mut movement = MovementStore::insert(&store, draft("alice", date, 1000))
            .await
            .unwrap();
        movement = MovementStore::update(
            &store,
            &movement.id,
            MovementChanges::default()
                .with_description("salary")
                .with_amount_in_cents(794_764),
        )
        .await
        .unwrap()
        .unwrap();

        let fetched = MovementStore::find_by_id(&store, &movement.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, movement);
        assert_eq!(fetched.date, date);
        assert_eq!(fetched.amount_in_cents, 794_764);
        assert_eq!(fetched.sort_discriminator, 1000);
    }

    #[tokio::test]
    async fn test_list_order_and_successor() {
        let store = SqliteStore::open_in_memory().unwrap();
        let march = NaiveDate::from_ymd_opt(2021, 3, 5).unwrap();
        let april = NaiveDate::from_ymd_opt(2021, 4, 1).unwrap();
        let user = UserId::new("alice");

        for (date, key) in [(april, 500), (march, 3000), (march, 1000)] {
            MovementStore::insert(&store, draft("alice", date, key))
                .await
                .unwrap();
        }

        let rows = store.list_by_user(&user).await.unwrap();
        let order: Vec<(NaiveDate, i64)> =
            rows.iter().map(|m| (m.date, m.sort_discriminator)).collect();
        assert_eq!(order, vec![(march, 1000), (march, 3000), (april, 500)]);

        let successor = store.find_successor(&user, march, 1000).await.unwrap();
        assert_eq!(successor.map(|m| m.sort_discriminator), Some(3000));
        assert!(store
            .find_successor(&user, april, 500)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_is_silent_for_missing_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        MovementStore::delete(&store, &MovementId::new("missing"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_batch_key_rewrite_is_applied() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2021, 3, 5).unwrap();

        let a = MovementStore::insert(&store, draft("alice", date, 1000))
            .await
            .unwrap();
        let b = MovementStore::insert(&store, draft("alice", date, 1001))
            .await
            .unwrap();

        store
            .apply_sort_discriminators(&[(a.id.clone(), 1000), (b.id.clone(), 2000)])
            .await
            .unwrap();

        let rows = store.list_by_user(&UserId::new("alice")).await.unwrap();
        let keys: Vec<i64> = rows.iter().map(|m| m.sort_discriminator).collect();
        assert_eq!(keys, vec![1000, 2000]);
    }

    #[tokio::test]
    async fn test_post_crud_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let post = PostStore::insert(
            &store,
            PostDraft {
                user_id: UserId::new("alice"),
                title: "Hello".to_string(),
                body: "# markdown body".to_string(),
            },
        )
        .await
        .unwrap();

        let updated = PostStore::update(
            &store,
            &post.id,
            PostChanges::default().with_title("Hello, world"),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.title, "Hello, world");
        assert_eq!(updated.body, "# markdown body");

        assert!(PostStore::delete(&store, &post.id).await.unwrap());
        assert!(!PostStore::delete(&store, &post.id).await.unwrap());
    }
}
