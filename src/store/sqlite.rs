//! SQLite-backed key-value store
//!
//! Counters, hashes and lists live in three tables (see `migrations/`).
//! Single primitives run on a pooled connection; [`KeyValueStore::apply`]
//! runs the whole batch inside one transaction.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use super::{Batch, Command, FieldMap, KeyValueStore, StoreError, resolve_range};
use crate::metrics::store_timer;

const BACKEND: &str = "sqlite";

/// SQLite [`KeyValueStore`]
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Backend(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!("Migration failed: {}", e))?;

        tracing::info!("Key-value tables connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Close the pool. Later calls fail with a backend error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// =============================================================================
// Primitives on a single connection
// =============================================================================

async fn increment(conn: &mut SqliteConnection, key: &str) -> Result<i64, StoreError> {
    let value = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO kv_counters (key, value) VALUES (?, 1)
        ON CONFLICT(key) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(key)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value)
}

async fn hash_set(
    conn: &mut SqliteConnection,
    key: &str,
    field: &str,
    value: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO kv_hashes (key, field, value) VALUES (?, ?, ?)
        ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(field)
    .bind(value)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn hash_delete(
    conn: &mut SqliteConnection,
    key: &str,
    field: &str,
) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM kv_hashes WHERE key = ? AND field = ?")
        .bind(key)
        .bind(field)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

async fn list_length(conn: &mut SqliteConnection, key: &str) -> Result<u64, StoreError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM kv_lists WHERE key = ?")
        .bind(key)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count as u64)
}

async fn list_push_front(
    conn: &mut SqliteConnection,
    key: &str,
    value: &str,
) -> Result<u64, StoreError> {
    sqlx::query(
        r#"
        INSERT INTO kv_lists (key, position, value)
        SELECT ?, COALESCE(MIN(position), 0) - 1, ? FROM kv_lists WHERE key = ?
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(key)
    .execute(&mut *conn)
    .await?;

    list_length(conn, key).await
}

async fn list_remove(
    conn: &mut SqliteConnection,
    key: &str,
    value: &str,
    count: i64,
) -> Result<u64, StoreError> {
    let result = if count == 0 {
        sqlx::query("DELETE FROM kv_lists WHERE key = ? AND value = ?")
            .bind(key)
            .bind(value)
            .execute(&mut *conn)
            .await?
    } else {
        let order = if count > 0 { "ASC" } else { "DESC" };
        let sql = format!(
            r#"
            DELETE FROM kv_lists WHERE key = ? AND position IN (
                SELECT position FROM kv_lists WHERE key = ? AND value = ?
                ORDER BY position {order} LIMIT ?
            )
            "#
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(key)
            .bind(value)
            .bind(count.unsigned_abs() as i64)
            .execute(&mut *conn)
            .await?
    };

    Ok(result.rows_affected())
}

async fn run(conn: &mut SqliteConnection, command: Command) -> Result<(), StoreError> {
    match command {
        Command::HashSet { key, field, value } => hash_set(conn, &key, &field, &value).await,
        Command::HashSetMany { key, fields } => {
            for (field, value) in &fields {
                hash_set(conn, &key, field, value).await?;
            }
            Ok(())
        }
        Command::HashDelete { key, field } => hash_delete(conn, &key, &field).await.map(|_| ()),
        Command::ListPushFront { key, value } => {
            list_push_front(conn, &key, &value).await.map(|_| ())
        }
        Command::ListRemove { key, value, count } => {
            list_remove(conn, &key, &value, count).await.map(|_| ())
        }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let _timer = store_timer(BACKEND, "increment");
        let mut conn = self.pool.acquire().await?;
        increment(&mut conn, key).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let _timer = store_timer(BACKEND, "hash_set");
        let mut conn = self.pool.acquire().await?;
        hash_set(&mut conn, key, field, value).await
    }

    async fn hash_set_many(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let _timer = store_timer(BACKEND, "hash_set_many");
        // One transaction so readers never observe half of the fields.
        let mut tx = self.pool.begin().await?;
        for (field, value) in fields {
            hash_set(&mut tx, key, field, value).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let _timer = store_timer(BACKEND, "hash_get");
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_hashes WHERE key = ? AND field = ?",
        )
        .bind(key)
        .bind(field)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> Result<FieldMap, StoreError> {
        let _timer = store_timer(BACKEND, "hash_get_all");
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT field, value FROM kv_hashes WHERE key = ?",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn hash_exists(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let _timer = store_timer(BACKEND, "hash_exists");
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM kv_hashes WHERE key = ? AND field = ?)",
        )
        .bind(key)
        .bind(field)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let _timer = store_timer(BACKEND, "hash_delete");
        let mut conn = self.pool.acquire().await?;
        hash_delete(&mut conn, key, field).await
    }

    async fn list_push_front(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let _timer = store_timer(BACKEND, "list_push_front");
        let mut tx = self.pool.begin().await?;
        let len = list_push_front(&mut tx, key, value).await?;
        tx.commit().await?;
        Ok(len)
    }

    async fn list_remove(&self, key: &str, value: &str, count: i64) -> Result<u64, StoreError> {
        let _timer = store_timer(BACKEND, "list_remove");
        let mut conn = self.pool.acquire().await?;
        list_remove(&mut conn, key, value, count).await
    }

    async fn list_length(&self, key: &str) -> Result<u64, StoreError> {
        let _timer = store_timer(BACKEND, "list_length");
        let mut conn = self.pool.acquire().await?;
        list_length(&mut conn, key).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let _timer = store_timer(BACKEND, "list_range");
        // Length and slice must come from the same snapshot.
        let mut tx = self.pool.begin().await?;
        let len = list_length(&mut tx, key).await?;
        let Some((first, last)) = resolve_range(start, stop, len) else {
            return Ok(Vec::new());
        };

        let values = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_lists WHERE key = ? ORDER BY position ASC LIMIT ? OFFSET ?",
        )
        .bind(key)
        .bind((last - first + 1) as i64)
        .bind(first as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(values)
    }

    async fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        let _timer = store_timer(BACKEND, "apply");
        let mut tx = self.pool.begin().await?;
        for command in batch.into_commands() {
            run(&mut tx, command).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
