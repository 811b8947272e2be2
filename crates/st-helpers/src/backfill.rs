//! Conditional backfill.

use crate::error::{HelperError, HelperResult};
use st_db::sql_utils::{quote_ident, quote_qualified};
use st_db::MigrationConnection;

/// Write `expression` into `column` wherever it is still NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backfill {
    pub table: String,
    pub column: String,
    /// SQL expression over the row's existing columns
    pub expression: String,
    /// Extra condition narrowing which rows are touched
    pub predicate: Option<String>,
}

impl Backfill {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            expression: expression.into(),
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub(crate) fn to_sql(&self) -> String {
        let mut sql = format!(
            "UPDATE {} SET {col} = ({}) WHERE {col} IS NULL",
            quote_qualified(&self.table),
            self.expression,
            col = quote_ident(&self.column),
        );
        if let Some(predicate) = &self.predicate {
            sql.push_str(&format!(" AND ({predicate})"));
        }
        sql
    }
}

/// Populate a column from existing data, never overwriting a value that is
/// already set. Returns the number of rows updated; a re-run updates none.
pub async fn backfill_where_null(
    conn: &dyn MigrationConnection,
    backfill: &Backfill,
) -> HelperResult<usize> {
    if backfill.expression.trim().is_empty() {
        return Err(HelperError::InvalidSpec(format!(
            "empty backfill expression for {}.{}",
            backfill.table, backfill.column
        )));
    }
    let updated = conn.execute(&backfill.to_sql()).await?;
    log::debug!(
        "Backfilled {} row(s) of {}.{}",
        updated,
        backfill.table,
        backfill.column
    );
    Ok(updated)
}

#[cfg(test)]
#[path = "backfill_test.rs"]
mod tests;
