//! st-db - Database connection layer for Stratum
//!
//! This crate provides the `MigrationConnection` trait that the migration
//! engine drives, the SQL dialect knowledge the data helpers need, and
//! implementations for DuckDB (always available) and Postgres (behind the
//! `postgres` feature).

pub mod dialect;
pub mod duckdb;
pub mod error;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sql_utils;
pub mod traits;

pub use dialect::SqlDialect;
pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
pub use traits::{MigrationConnection, Row};
