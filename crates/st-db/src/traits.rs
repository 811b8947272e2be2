//! Connection trait definition

use crate::dialect::SqlDialect;
use crate::error::DbResult;
use async_trait::async_trait;

/// One result row, every column rendered as text (`None` for SQL NULL).
pub type Row = Vec<Option<String>>;

/// A single database session that migrations run against.
///
/// All calls go through the same underlying session: `begin`/`commit`
/// bracket whatever a migration body issues in between, and a lock taken by
/// `try_acquire_lock` belongs to this session until released.
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait MigrationConnection: Send + Sync {
    /// Execute one statement, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute one or more statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Run a query and return every row as text columns
    async fn query_rows(&self, sql: &str) -> DbResult<Vec<Row>>;

    /// Run a query whose first column of the first row is an integer
    async fn query_scalar_i64(&self, sql: &str) -> DbResult<i64>;

    /// Check if a table or view exists (unqualified names use the current schema)
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Open a transaction on this session
    async fn begin(&self) -> DbResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> DbResult<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> DbResult<()>;

    /// Make one non-blocking attempt to take the cross-process migration lock.
    ///
    /// Returns `Ok(false)` when another session holds it.
    async fn try_acquire_lock(&self, key: i64, owner: &str) -> DbResult<bool>;

    /// Release a lock previously taken with `try_acquire_lock`
    async fn release_lock(&self, key: i64, owner: &str) -> DbResult<()>;

    /// SQL dialect spoken by this session
    fn dialect(&self) -> SqlDialect;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
