//! Deduplicate-then-constrain.

use crate::error::{HelperError, HelperResult};
use st_db::sql_utils::{quote_ident, quote_qualified};
use st_db::MigrationConnection;

/// Which rows to collapse and which constraint to add afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeSpec {
    /// Table to clean, optionally schema-qualified
    pub table: String,
    /// Columns that must become unique together
    pub key_columns: Vec<String>,
    /// Column ordering rows within a key; the smallest value survives
    pub tiebreak: String,
    /// Name of the uniqueness constraint (or index) to create
    pub constraint_name: String,
}

impl DedupeSpec {
    pub fn new(
        table: impl Into<String>,
        key_columns: &[&str],
        tiebreak: impl Into<String>,
        constraint_name: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
            tiebreak: tiebreak.into(),
            constraint_name: constraint_name.into(),
        }
    }

    fn validate(&self) -> HelperResult<()> {
        if self.key_columns.is_empty() {
            return Err(HelperError::InvalidSpec(format!(
                "no key columns given for {}",
                self.table
            )));
        }
        if self.tiebreak.is_empty() || self.constraint_name.is_empty() {
            return Err(HelperError::InvalidSpec(format!(
                "tiebreak and constraint name are required for {}",
                self.table
            )));
        }
        Ok(())
    }

    fn not_null_filter(&self) -> String {
        self.key_columns
            .iter()
            .map(|c| format!("{} IS NOT NULL", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn key_list(&self) -> String {
        self.key_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Rows removed by [`dedupe_then_constrain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupeOutcome {
    pub deleted: usize,
}

/// Keep the earliest row per natural key, delete the rest, then add the
/// uniqueness constraint.
///
/// Rows with a NULL in any key column are left alone; unique constraints do
/// not treat NULLs as equal. Ties on the tiebreak column fall back to the
/// physical row id so the surviving row is deterministic.
pub async fn dedupe_then_constrain(
    conn: &dyn MigrationConnection,
    spec: &DedupeSpec,
) -> HelperResult<DedupeOutcome> {
    spec.validate()?;
    let dialect = conn.dialect();
    let table = quote_qualified(&spec.table);
    let row_id = dialect.row_id();
    let filter = spec.not_null_filter();
    let keys = spec.key_list();

    let delete = format!(
        "DELETE FROM {table} WHERE {row_id} IN (\
         SELECT rid FROM (\
         SELECT {row_id} AS rid, ROW_NUMBER() OVER (PARTITION BY {keys} ORDER BY {tiebreak} ASC NULLS LAST, {row_id} ASC) AS rn \
         FROM {table} WHERE {filter}\
         ) ranked WHERE rn > 1)",
        tiebreak = quote_ident(&spec.tiebreak),
    );
    let deleted = conn.execute(&delete).await?;
    log::debug!("Removed {} duplicate row(s) from {}", deleted, spec.table);

    let residual = conn
        .query_scalar_i64(&format!(
            "SELECT COUNT(*) FROM (SELECT {keys} FROM {table} WHERE {filter} \
             GROUP BY {keys} HAVING COUNT(*) > 1) dup"
        ))
        .await?;
    if residual > 0 {
        return Err(HelperError::PreexistingState(format!(
            "{} still has {} duplicate key group(s) on ({}) after cleanup",
            spec.table,
            residual,
            spec.key_columns.join(", ")
        )));
    }

    conn.execute(&dialect.add_unique_constraint(
        &spec.table,
        &spec.constraint_name,
        &spec.key_columns,
    ))
    .await?;

    Ok(DedupeOutcome { deleted })
}

#[cfg(test)]
#[path = "dedupe_test.rs"]
mod tests;
