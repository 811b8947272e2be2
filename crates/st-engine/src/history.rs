//! The history table.
//!
//! One row per attempted unit. Rows for transactional units are written on
//! the same session inside the unit's transaction; rows for
//! non-transactional units are written in autocommit right after the body
//! finishes.

use chrono::{DateTime, Utc};
use st_core::{HistoryRecord, MigrateResult, MigrationUnit, Version, BASELINE_CHECKSUM};
use st_db::sql_utils::{quote_ident, quote_literal, quote_qualified, split_qualified_name};
use st_db::{DbError, MigrationConnection, Row};

/// Reads and writes the history table on whatever session it is handed.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    table: String,
}

impl HistoryStore {
    /// `table` may be schema-qualified.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn qualified(&self) -> String {
        quote_qualified(&self.table)
    }

    /// Whether the table has been created yet.
    pub async fn exists(&self, conn: &dyn MigrationConnection) -> MigrateResult<bool> {
        Ok(conn.relation_exists(&self.table).await?)
    }

    /// Create the table (and its schema) if absent.
    pub async fn ensure_initialized(&self, conn: &dyn MigrationConnection) -> MigrateResult<()> {
        if let (Some(schema), _) = split_qualified_name(&self.table) {
            conn.execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)))
                .await?;
        }
        conn.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             version TEXT PRIMARY KEY, \
             description TEXT NOT NULL, \
             checksum TEXT NOT NULL, \
             success BOOLEAN NOT NULL, \
             applied_at TIMESTAMPTZ NOT NULL, \
             execution_time_ms BIGINT NOT NULL)",
            self.qualified()
        ))
        .await?;
        Ok(())
    }

    /// Every recorded row, in ascending version order.
    pub async fn load_applied(
        &self,
        conn: &dyn MigrationConnection,
    ) -> MigrateResult<Vec<HistoryRecord>> {
        let sql = format!(
            "SELECT version, description, checksum, \
             CASE WHEN success THEN 1 ELSE 0 END, {}, execution_time_ms FROM {}",
            conn.dialect().epoch_millis("applied_at"),
            self.qualified()
        );
        let mut records = conn
            .query_rows(&sql)
            .await?
            .into_iter()
            .map(parse_row)
            .collect::<MigrateResult<Vec<_>>>()?;
        // text order would put 0.10 before 0.9
        records.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(records)
    }

    /// Number of rows in the table.
    pub async fn count(&self, conn: &dyn MigrationConnection) -> MigrateResult<usize> {
        let n = conn
            .query_scalar_i64(&format!("SELECT COUNT(*) FROM {}", self.qualified()))
            .await?;
        Ok(n.max(0) as usize)
    }

    /// Write the outcome of executing `unit`.
    pub async fn record_attempt(
        &self,
        conn: &dyn MigrationConnection,
        unit: &MigrationUnit,
        success: bool,
        execution_time_ms: i64,
        applied_by: &str,
    ) -> MigrateResult<HistoryRecord> {
        let record = HistoryRecord {
            version: unit.version().clone(),
            description: unit.description().to_string(),
            checksum: unit.checksum().to_string(),
            success,
            applied_at: now_millis(),
            execution_time_ms,
            applied_by: Some(applied_by.to_string()),
        };
        self.insert(conn, &record).await?;
        Ok(record)
    }

    /// Write a marker row declaring everything up to `version` as applied.
    pub async fn insert_baseline(
        &self,
        conn: &dyn MigrationConnection,
        version: &Version,
        description: &str,
        applied_by: &str,
    ) -> MigrateResult<HistoryRecord> {
        let record = HistoryRecord {
            version: version.clone(),
            description: description.to_string(),
            checksum: BASELINE_CHECKSUM.to_string(),
            success: true,
            applied_at: now_millis(),
            execution_time_ms: 0,
            applied_by: Some(applied_by.to_string()),
        };
        self.insert(conn, &record).await?;
        Ok(record)
    }

    /// Flip a `success=false` row to resolved.
    ///
    /// When the unit is still registered its current checksum and
    /// description replace the recorded ones, so a fix made to the unit
    /// alongside the manual repair does not read as drift. Returns `false`
    /// when no failed row exists for `version`.
    pub async fn mark_repaired(
        &self,
        conn: &dyn MigrationConnection,
        version: &Version,
        current: Option<&MigrationUnit>,
    ) -> MigrateResult<bool> {
        let mut assignments = vec!["success = TRUE".to_string()];
        if let Some(unit) = current {
            assignments.push(format!("checksum = {}", quote_literal(unit.checksum())));
            assignments.push(format!(
                "description = {}",
                quote_literal(unit.description())
            ));
        }
        let updated = conn
            .execute(&format!(
                "UPDATE {} SET {} WHERE version = {} AND success = FALSE",
                self.qualified(),
                assignments.join(", "),
                quote_literal(&version.to_string())
            ))
            .await?;
        Ok(updated > 0)
    }

    async fn insert(
        &self,
        conn: &dyn MigrationConnection,
        record: &HistoryRecord,
    ) -> MigrateResult<()> {
        let millis = record.applied_at.timestamp_millis();
        conn.execute(&format!(
            "INSERT INTO {} (version, description, checksum, success, applied_at, execution_time_ms) \
             VALUES ({}, {}, {}, {}, to_timestamp({}.{:03}), {})",
            self.qualified(),
            quote_literal(&record.version.to_string()),
            quote_literal(&record.description),
            quote_literal(&record.checksum),
            if record.success { "TRUE" } else { "FALSE" },
            millis.div_euclid(1000),
            millis.rem_euclid(1000),
            record.execution_time_ms
        ))
        .await?;
        Ok(())
    }
}

/// Current time truncated to what the table round-trips.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn parse_row(row: Row) -> MigrateResult<HistoryRecord> {
    let malformed = |what: &str| DbError::Internal(format!("history row has bad {what}"));
    let mut cols = row.into_iter();
    let mut next = |what: &str| cols.next().flatten().ok_or_else(|| malformed(what));

    let version = Version::parse(&next("version")?)?;
    let description = next("description")?;
    let checksum = next("checksum")?;
    let success = matches!(next("success")?.as_str(), "1" | "true");
    let applied_at = next("applied_at")?
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| malformed("applied_at"))?;
    let execution_time_ms = next("execution_time_ms")?
        .parse::<i64>()
        .map_err(|_| malformed("execution_time_ms"))?;

    Ok(HistoryRecord {
        version,
        description,
        checksum,
        success,
        applied_at,
        execution_time_ms,
        applied_by: None,
    })
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
