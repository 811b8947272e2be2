//! PostgreSQL backend implementation
//!
//! Holds a single `PgConnection` for the whole run: session-level advisory
//! locks and `BEGIN`/`COMMIT` only mean something on one session.

use crate::dialect::SqlDialect;
use crate::error::{DbError, DbResult};
use crate::sql_utils::{quote_literal, split_qualified_name};
use crate::traits::{MigrationConnection, Row};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, Row as _};
use tokio::sync::Mutex;

/// PostgreSQL database backend
pub struct PostgresBackend {
    conn: Mutex<PgConnection>,
}

impl PostgresBackend {
    /// Connect with a `postgres://` URL
    pub async fn connect(url: &str) -> DbResult<Self> {
        let conn = PgConnection::connect(url)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: PgConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    async fn raw(&self, sql: &str) -> DbResult<u64> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::raw_sql(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::from(e).with_sql(sql))?;
        Ok(result.rows_affected())
    }
}

/// Read a column value as text, trying the Postgres types callers select.
fn column_as_text(row: &PgRow, idx: usize) -> Option<String> {
    if let Ok(s) = row.try_get::<Option<String>, _>(idx) {
        return s;
    }
    if let Ok(n) = row.try_get::<Option<i64>, _>(idx) {
        return n.map(|n| n.to_string());
    }
    if let Ok(n) = row.try_get::<Option<i32>, _>(idx) {
        return n.map(|n| n.to_string());
    }
    if let Ok(f) = row.try_get::<Option<f64>, _>(idx) {
        return f.map(|f| f.to_string());
    }
    if let Ok(b) = row.try_get::<Option<bool>, _>(idx) {
        return b.map(|b| b.to_string());
    }
    None
}

#[async_trait]
impl MigrationConnection for PostgresBackend {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        Ok(self.raw(sql).await? as usize)
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.raw(sql).await?;
        Ok(())
    }

    async fn query_rows(&self, sql: &str) -> DbResult<Vec<Row>> {
        let mut conn = self.conn.lock().await;
        let rows = sqlx::raw_sql(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DbError::from(e).with_sql(sql))?;
        Ok(rows
            .iter()
            .map(|row| (0..row.len()).map(|i| column_as_text(row, i)).collect())
            .collect())
    }

    async fn query_scalar_i64(&self, sql: &str) -> DbResult<i64> {
        let mut conn = self.conn.lock().await;
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| DbError::from(e).with_sql(sql))
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
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
        Ok(self.query_scalar_i64(&sql).await? > 0)
    }

    async fn begin(&self) -> DbResult<()> {
        self.raw("BEGIN").await.map(|_| ())
    }

    async fn commit(&self) -> DbResult<()> {
        self.raw("COMMIT").await.map(|_| ())
    }

    async fn rollback(&self) -> DbResult<()> {
        self.raw("ROLLBACK").await.map(|_| ())
    }

    async fn try_acquire_lock(&self, key: i64, _owner: &str) -> DbResult<bool> {
        let mut conn = self.conn.lock().await;
        sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .map_err(DbError::from)
    }

    async fn release_lock(&self, key: i64, owner: &str) -> DbResult<()> {
        let mut conn = self.conn.lock().await;
        let released = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .map_err(DbError::from)?;
        if !released {
            log::warn!("Advisory lock {key} was not held by {owner} at release");
        }
        Ok(())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn db_type(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
