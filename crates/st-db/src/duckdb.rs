//! DuckDB backend implementation

use crate::dialect::SqlDialect;
use crate::error::{DbError, DbResult};
use crate::sql_utils::{quote_literal, split_qualified_name};
use crate::traits::{MigrationConnection, Row};
use async_trait::async_trait;
use duckdb::Connection;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Table holding the migration lock row on DuckDB.
///
/// DuckDB has no advisory locks, so a primary-key row plays that role: the
/// session that inserts `lock_key` first owns the lock until it deletes it.
/// A DuckDB file admits one writing process, so a row whose owner is not
/// live in this process was left by a dead one and is taken over.
pub const LOCK_TABLE: &str = "stratum_migration_lock";

/// Lock rows held right now by this process: `(database, key, owner)`.
static LIVE_LOCKS: Mutex<BTreeSet<(u64, i64, String)>> = Mutex::new(BTreeSet::new());

static NEXT_DATABASE_ID: AtomicU64 = AtomicU64::new(1);

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
    /// Shared by every session cloned from the same open database
    database_id: u64,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::wrap(conn))
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self::wrap(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Open a second, independent session against the same database.
    ///
    /// Each session has its own transaction state, which is how two
    /// application instances racing to migrate look from inside one process.
    pub fn try_clone(&self) -> DbResult<Self> {
        let conn = self.lock_conn()?;
        let cloned = conn
            .try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(cloned),
            database_id: self.database_id,
        })
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            database_id: NEXT_DATABASE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn lock_conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute SQL synchronously
    fn execute_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock_conn()?;
        conn.execute(sql, [])
            .map_err(|e| DbError::from(e).with_sql(sql))
    }

    /// Execute batch SQL synchronously
    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(sql).map_err(DbError::from)
    }

    /// Collect all rows of a query as text columns
    fn query_rows_sync(&self, sql: &str) -> DbResult<Vec<Row>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(sql).map_err(|e| DbError::from(e).with_sql(sql))?;
        let rows = stmt
            .query_map([], |row| {
                let col_count = row.as_ref().column_count();
                Ok((0..col_count)
                    .map(|i| column_as_text(row, i))
                    .collect::<Row>())
            })
            .map_err(|e| DbError::from(e).with_sql(sql))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::from)?;
        Ok(rows)
    }

    fn query_scalar_i64_sync(&self, sql: &str) -> DbResult<i64> {
        let conn = self.lock_conn()?;
        conn.query_row(sql, [], |row| row.get::<_, i64>(0))
            .map_err(|e| DbError::from(e).with_sql(sql))
    }

    /// Check if relation exists synchronously
    fn relation_exists_sync(&self, name: &str) -> DbResult<bool> {
        let (schema, table) = split_qualified_name(name);
        let schema_predicate = match schema {
            Some(schema) => quote_literal(schema),
            None => "current_schema()".to_string(),
        };
        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
            schema_predicate,
            quote_literal(table)
        );
        Ok(self.query_scalar_i64_sync(&sql)? > 0)
    }

    fn try_acquire_lock_sync(&self, key: i64, owner: &str) -> DbResult<bool> {
        let conn = self.lock_conn()?;
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {LOCK_TABLE} (
                 lock_key    BIGINT PRIMARY KEY,
                 owner       TEXT NOT NULL,
                 acquired_at TIMESTAMPTZ NOT NULL
             )"
        );
        match conn.execute_batch(&create).map_err(DbError::from) {
            Ok(()) => {}
            Err(DbError::Conflict(msg)) => {
                log::debug!("Lock table creation raced another session: {msg}");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        if self.insert_lock_row(&conn, key, owner)? {
            return Ok(true);
        }

        let holders = {
            let mut stmt = conn
                .prepare(&format!("SELECT owner FROM {LOCK_TABLE} WHERE lock_key = ?"))
                .map_err(DbError::from)?;
            let rows = stmt
                .query_map(duckdb::params![key], |row| row.get::<_, String>(0))
                .map_err(DbError::from)?;
            rows.collect::<Result<Vec<String>, _>>()
                .map_err(DbError::from)?
        };
        let Some(holder) = holders.into_iter().next() else {
            // released between our insert and the lookup
            return Ok(false);
        };
        if self.is_live(key, &holder)? {
            log::debug!("Migration lock {key} is held by {holder}");
            return Ok(false);
        }

        log::warn!("Taking over migration lock {key} left behind by {holder}");
        conn.execute(
            &format!("DELETE FROM {LOCK_TABLE} WHERE lock_key = ? AND owner = ?"),
            duckdb::params![key, holder],
        )
        .map_err(DbError::from)?;
        self.insert_lock_row(&conn, key, owner)
    }

    /// `Ok(false)` when another row already holds `key`.
    fn insert_lock_row(&self, conn: &Connection, key: i64, owner: &str) -> DbResult<bool> {
        let insert = format!(
            "INSERT INTO {LOCK_TABLE} (lock_key, owner, acquired_at) VALUES (?, ?, now())"
        );
        match conn
            .execute(&insert, duckdb::params![key, owner])
            .map_err(DbError::from)
        {
            Ok(_) => {
                live_locks()?.insert((self.database_id, key, owner.to_string()));
                Ok(true)
            }
            Err(DbError::Conflict(msg)) => {
                log::debug!("Migration lock {key} is taken: {msg}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn is_live(&self, key: i64, owner: &str) -> DbResult<bool> {
        Ok(live_locks()?.contains(&(self.database_id, key, owner.to_string())))
    }

    fn release_lock_sync(&self, key: i64, owner: &str) -> DbResult<()> {
        let conn = self.lock_conn()?;
        let deleted = conn
            .execute(
                &format!("DELETE FROM {LOCK_TABLE} WHERE lock_key = ? AND owner = ?"),
                duckdb::params![key, owner],
            )
            .map_err(DbError::from)?;
        live_locks()?.remove(&(self.database_id, key, owner.to_string()));
        if deleted == 0 {
            log::warn!("Migration lock {key} was not held by {owner} at release");
        }
        Ok(())
    }
}

fn live_locks() -> DbResult<MutexGuard<'static, BTreeSet<(u64, i64, String)>>> {
    LIVE_LOCKS
        .lock()
        .map_err(|e| DbError::MutexPoisoned(e.to_string()))
}

/// Read a column value as text, trying the DuckDB types callers select.
///
/// DuckDB integer columns error for `Option<String>`, so we try
/// String -> i64 -> f64 -> bool. `Ok(None)` on any of them means SQL NULL.
fn column_as_text(row: &duckdb::Row<'_>, idx: usize) -> Option<String> {
    if let Ok(s) = row.get::<_, Option<String>>(idx) {
        return s;
    }
    if let Ok(n) = row.get::<_, Option<i64>>(idx) {
        return n.map(|n| n.to_string());
    }
    if let Ok(f) = row.get::<_, Option<f64>>(idx) {
        return f.map(|f| f.to_string());
    }
    if let Ok(b) = row.get::<_, Option<bool>>(idx) {
        return b.map(|b| b.to_string());
    }
    None
}

#[async_trait]
impl MigrationConnection for DuckDbBackend {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.execute_sync(sql)
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.execute_batch_sync(sql)
    }

    async fn query_rows(&self, sql: &str) -> DbResult<Vec<Row>> {
        self.query_rows_sync(sql)
    }

    async fn query_scalar_i64(&self, sql: &str) -> DbResult<i64> {
        self.query_scalar_i64_sync(sql)
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.relation_exists_sync(name)
    }

    async fn begin(&self) -> DbResult<()> {
        self.execute_batch_sync("BEGIN TRANSACTION")
    }

    async fn commit(&self) -> DbResult<()> {
        self.execute_batch_sync("COMMIT")
    }

    async fn rollback(&self) -> DbResult<()> {
        self.execute_batch_sync("ROLLBACK")
    }

    async fn try_acquire_lock(&self, key: i64, owner: &str) -> DbResult<bool> {
        self.try_acquire_lock_sync(key, owner)
    }

    async fn release_lock(&self, key: i64, owner: &str) -> DbResult<()> {
        self.release_lock_sync(key, owner)
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::DuckDb
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
