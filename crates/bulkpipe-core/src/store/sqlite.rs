//! SQLite-backed store implementation.
//!
//! Records live in a single table partitioned by collection name. Inserts
//! mimic a streaming-insert endpoint: rows are validated first, and one bad
//! row fails the whole request with `stopped` on every sibling row.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

use super::error::StoreError;
use super::traits::{BatchStore, QueryStore, StoreKey, WriteStore};
use super::types::{Batch, InsertRequest, Page, RowError, RowErrors, WriteResponse, STOPPED_REASON};
use crate::ids;
use crate::timestamp::Timestamp;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// A stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub created_at: Timestamp,
    pub payload: serde_json::Value,
}

/// Handle to the SQLite-backed store.
///
/// The default database lives under the XDG state directory:
/// `~/.local/state/bulkpipe/store.db` on Debian.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("bulkpipe")?;
        let db_path = xdg_dirs.get_state_home().join("bulkpipe").join("store.db");
        Self::open_at(db_path).await
    }

    /// Open (or create) the store at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open a private in-memory store (single connection, no disk I/O).
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                created_secs INTEGER NOT NULL,
                created_nanos INTEGER NOT NULL,
                payload TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS records_collection_id ON records (collection, id);",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Scoped query handle over one collection, ordered by id.
    pub fn collection(self: &Arc<Self>, name: impl Into<String>) -> SqliteCollection {
        SqliteCollection {
            store: Arc::clone(self),
            name: name.into(),
        }
    }

    /// Number of records currently stored in `collection`.
    pub async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM records WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(u64::try_from(n).unwrap_or_default())
    }

    /// Keyset fetch: at most `limit` records with id greater than `after`.
    pub async fn fetch_after(
        &self,
        collection: &str,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT id, created_secs, created_nanos, payload
            FROM records
            WHERE collection = ?1 AND id > ?2
            ORDER BY id ASC
            LIMIT ?3
            "#,
        )
        .bind(collection)
        .bind(after.unwrap_or(i64::MIN))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            let payload = serde_json::from_str(&payload)
                .map_err(|e| StoreError::wrapped("corrupt record payload", e))?;
            out.push(Record {
                id: row.get("id"),
                created_at: Timestamp {
                    seconds: row.get("created_secs"),
                    nanos: row.get("created_nanos"),
                },
                payload,
            });
        }
        Ok(out)
    }

    fn invalid_rows(rows: &[serde_json::Value]) -> RowErrors {
        let mut errors = RowErrors::new();
        for (index, row) in (0i64..).zip(rows) {
            if !row.is_object() {
                errors.insert(
                    index,
                    vec![RowError::new(index, "invalid", "row must be a JSON object")],
                );
            }
        }
        if !errors.is_empty() {
            for index in 0..(rows.len() as i64) {
                errors.entry(index).or_insert_with(|| {
                    vec![RowError::new(
                        index,
                        STOPPED_REASON,
                        "row not inserted because another row in the request failed",
                    )]
                });
            }
        }
        errors
    }
}

#[async_trait]
impl WriteStore for SqliteStore {
    async fn insert_all(&self, request: &InsertRequest) -> Result<WriteResponse, StoreError> {
        if ids::is_invalid_id(&request.collection) {
            return Err(StoreError::remote(format!(
                "invalid collection name: {:?}",
                request.collection
            )));
        }
        let row_errors = Self::invalid_rows(&request.rows);
        if !row_errors.is_empty() {
            return Ok(WriteResponse::with_errors(row_errors));
        }

        let now = Timestamp::now();
        let mut tx = self.pool.begin().await?;
        for row in &request.rows {
            sqlx::query(
                r#"
                INSERT INTO records (collection, created_secs, created_nanos, payload)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&request.collection)
            .bind(now.seconds)
            .bind(now.nanos)
            .bind(row.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(WriteResponse::default())
    }
}

#[async_trait]
impl BatchStore<RecordKey> for SqliteStore {
    async fn commit_batch(&self, batch: &Batch<RecordKey>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for key in batch.keys() {
            sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
                .bind(&key.collection)
                .bind(key.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Query over a single collection.
#[derive(Debug, Clone)]
pub struct SqliteCollection {
    store: Arc<SqliteStore>,
    name: String,
}

impl SqliteCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delete key for a record of this collection.
    pub fn key(&self, record: &Record) -> RecordKey {
        RecordKey {
            store: Arc::clone(&self.store),
            collection: self.name.clone(),
            id: record.id,
        }
    }
}

#[async_trait]
impl QueryStore for SqliteCollection {
    type Item = Record;
    type Cursor = i64;

    fn cursor_of(item: &Record) -> i64 {
        item.id
    }

    async fn query(&self, after: Option<&i64>, limit: usize) -> Result<Page<Record>, StoreError> {
        let records = self
            .store
            .fetch_after(&self.name, after.copied(), limit)
            .await?;
        Ok(Page::new(records))
    }
}

/// Reference to one stored record, bound to the store that holds it.
#[derive(Debug, Clone)]
pub struct RecordKey {
    store: Arc<SqliteStore>,
    pub collection: String,
    pub id: i64,
}

impl StoreKey for RecordKey {
    type Store = SqliteStore;

    fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }
}
