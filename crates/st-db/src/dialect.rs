//! SQL dialect knowledge for statements the engine and helpers generate
//!
//! Migration bodies written by hand are passed through untouched. Only the
//! few statements Stratum builds itself differ between backends.

use crate::sql_utils::{quote_column_list, quote_ident, quote_literal, quote_qualified};

/// Backend SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// DuckDB SQL dialect
    DuckDb,
    /// PostgreSQL dialect
    Postgres,
}

impl SqlDialect {
    /// Get the dialect name
    pub fn name(&self) -> &'static str {
        match self {
            SqlDialect::DuckDb => "duckdb",
            SqlDialect::Postgres => "postgres",
        }
    }

    /// Physical row identifier usable in `WHERE <id> IN (...)`.
    pub fn row_id(&self) -> &'static str {
        match self {
            SqlDialect::DuckDb => "rowid",
            SqlDialect::Postgres => "ctid",
        }
    }

    /// Expression reading a `TIMESTAMPTZ` column as epoch milliseconds (BIGINT).
    pub fn epoch_millis(&self, column: &str) -> String {
        let col = quote_ident(column);
        match self {
            SqlDialect::DuckDb => format!("epoch_ms({col})"),
            SqlDialect::Postgres => {
                format!("CAST(EXTRACT(EPOCH FROM {col}) * 1000 AS BIGINT)")
            }
        }
    }

    /// Statement adding a uniqueness guarantee over `columns`.
    ///
    /// DuckDB has no `ADD CONSTRAINT ... UNIQUE`; a unique index enforces the
    /// same invariant there.
    pub fn add_unique_constraint(&self, table: &str, name: &str, columns: &[String]) -> String {
        let cols = quote_column_list(columns);
        match self {
            SqlDialect::DuckDb => format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                quote_ident(name),
                quote_qualified(table),
                cols
            ),
            SqlDialect::Postgres => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                quote_qualified(table),
                quote_ident(name),
                cols
            ),
        }
    }

    /// Query counting how many times `literal` already appears in enum `type_name`.
    ///
    /// `None` when the backend cannot extend enum types in place.
    pub fn enum_literal_count(&self, type_name: &str, literal: &str) -> Option<String> {
        match self {
            SqlDialect::DuckDb => None,
            SqlDialect::Postgres => Some(format!(
                "SELECT COUNT(*) FROM pg_enum e JOIN pg_type t ON e.enumtypid = t.oid \
                 WHERE t.typname = {} AND e.enumlabel = {}",
                quote_literal(type_name),
                quote_literal(literal)
            )),
        }
    }

    /// Statement appending `literal` to enum `type_name`.
    ///
    /// `None` when the backend cannot extend enum types in place.
    pub fn add_enum_value(&self, type_name: &str, literal: &str) -> Option<String> {
        match self {
            SqlDialect::DuckDb => None,
            SqlDialect::Postgres => Some(format!(
                "ALTER TYPE {} ADD VALUE IF NOT EXISTS {}",
                quote_qualified(type_name),
                quote_literal(literal)
            )),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
#[path = "dialect_test.rs"]
mod tests;
