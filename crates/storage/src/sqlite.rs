//! Durable SQLite storage backend.
//!
//! This module provides [`SqliteBackend`], a single-file durable
//! implementation of [`StorageBackend`] backed by an embedded SQLite
//! database with one `kv(key BLOB PRIMARY KEY, value BLOB)` table.
//!
//! Operations execute synchronously on the calling task under a connection
//! mutex. SQLite local I/O completes within a bounded time (a busy timeout
//! is configured), which matches the service's short-lived, non-streaming
//! request model.
//!
//! Transactions map onto SQLite transactions opened with
//! `BEGIN IMMEDIATE`; buffered compare-and-set preconditions are re-checked
//! inside the transaction before any write is applied, so a failed
//! precondition rolls the whole batch back.

use std::{
    ops::{Bound, RangeBounds},
    path::Path,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    transaction::{CasOp, Transaction},
    types::KeyValue,
};

/// Durable storage backend over an embedded SQLite database.
///
/// # Cloning
///
/// `SqliteBackend` is cheaply cloneable via [`Arc`]; all clones share the
/// same connection.
///
/// # Example
///
/// ```no_run
/// use gatehouse_storage::{SqliteBackend, StorageBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = SqliteBackend::open("/var/lib/gatehouse/data.sqlite")?;
/// backend.set(b"key".to_vec(), b"value".to_vec()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Opens (or creates) a database file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the file cannot be opened or
    /// the schema cannot be initialized.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            StorageError::connection_with_source("failed to open sqlite database", e)
        })?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// Useful for tests that want SQLite semantics without touching disk.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StorageError::connection_with_source("failed to open in-memory sqlite database", e)
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(map_sqlite_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(map_sqlite_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(map_sqlite_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   BLOB PRIMARY KEY,
                value BLOB NOT NULL
            ) WITHOUT ROWID;",
        )
        .map_err(map_sqlite_err)?;

        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

/// Maps a rusqlite error to the canonical storage error type.
fn map_sqlite_err(e: rusqlite::Error) -> StorageError {
    StorageError::internal_with_source("sqlite operation failed", e)
}

fn read_current(conn: &Connection, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
        .map_err(map_sqlite_err)
}

fn cas_matches(expected: Option<&[u8]>, current: Option<&[u8]>) -> bool {
    match (expected, current) {
        (None, None) => true,
        (Some(exp), Some(cur)) => exp == cur,
        _ => false,
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let conn = self.conn.lock();
        Ok(read_current(&conn, key)?.map(Bytes::from))
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)", params![key, value])
            .map_err(map_sqlite_err)?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_err)?;

        let current = read_current(&tx, key)?;
        if !cas_matches(expected, current.as_deref()) {
            // Dropping the transaction rolls it back
            return Err(StorageError::Conflict);
        }

        tx.execute("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)", params![key, new_value])
            .map_err(map_sqlite_err)?;
        tx.commit().map_err(map_sqlite_err)
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key]).map_err(map_sqlite_err)?;
        Ok(())
    }

    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send,
    {
        let mut clauses: Vec<&str> = Vec::new();
        let mut bind: Vec<Vec<u8>> = Vec::new();

        match range.start_bound() {
            Bound::Included(b) => {
                clauses.push("key >= ?");
                bind.push(b.clone());
            },
            Bound::Excluded(b) => {
                clauses.push("key > ?");
                bind.push(b.clone());
            },
            Bound::Unbounded => {},
        }
        match range.end_bound() {
            Bound::Included(b) => {
                clauses.push("key <= ?");
                bind.push(b.clone());
            },
            Bound::Excluded(b) => {
                clauses.push("key < ?");
                bind.push(b.clone());
            },
            Bound::Unbounded => {},
        }

        let mut sql = String::from("SELECT key, value FROM kv");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY key ASC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(bind.iter()), |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(map_sqlite_err)?;

        let mut results = Vec::new();
        for row in rows {
            let (key, value) = row.map_err(map_sqlite_err)?;
            results.push(KeyValue::new(Bytes::from(key), Bytes::from(value)));
        }
        Ok(results)
    }

    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        Ok(Box::new(SqliteTransaction::new(self.clone())))
    }

    async fn health_check(&self) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(())).map_err(map_sqlite_err)
    }
}

/// SQLite transaction implementation.
///
/// Buffers writes like the in-memory transaction; at commit time the buffer
/// is replayed inside a single `BEGIN IMMEDIATE` SQLite transaction with all
/// CAS preconditions verified first.
struct SqliteTransaction {
    backend: SqliteBackend,
    pending_writes: std::collections::BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    pending_cas: Vec<CasOp>,
}

impl SqliteTransaction {
    fn new(backend: SqliteBackend) -> Self {
        Self {
            backend,
            pending_writes: std::collections::BTreeMap::new(),
            pending_cas: Vec::new(),
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        if let Some(value) = self.pending_writes.get(key) {
            return Ok(value.as_ref().map(|v| Bytes::copy_from_slice(v)));
        }

        self.backend.get(key).await
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending_writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.pending_writes.insert(key, None);
    }

    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        self.pending_cas.push(CasOp { key, expected, new_value });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let mut conn = self.backend.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_err)?;

        for cas in &self.pending_cas {
            let current = read_current(&tx, &cas.key)?;
            if !cas_matches(cas.expected.as_deref(), current.as_deref()) {
                return Err(StorageError::Conflict);
            }
        }

        for cas in &self.pending_cas {
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![cas.key, cas.new_value],
            )
            .map_err(map_sqlite_err)?;
        }

        for (key, value) in &self.pending_writes {
            match value {
                Some(v) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                        params![key, v],
                    )
                    .map_err(map_sqlite_err)?;
                },
                None => {
                    tx.execute("DELETE FROM kv WHERE key = ?1", params![key])
                        .map_err(map_sqlite_err)?;
                },
            }
        }

        tx.commit().map_err(map_sqlite_err)
    }
}
