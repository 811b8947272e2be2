//! st-core - Core library for Stratum
//!
//! This crate provides the pieces of the migration engine that never touch a
//! live database on their own: version parsing and ordering, migration units
//! and their checksums, the registry that discovers them, the orderer that
//! diffs them against recorded history, the error taxonomy, and
//! configuration parsing.

pub mod checksum;
pub mod config;
pub mod error;
pub mod history;
pub mod orderer;
pub mod registry;
pub mod statements;
pub mod unit;
pub mod version;

pub use checksum::{canonicalize_sql, compute_checksum};
pub use config::{Config, DbType};
pub use error::{MigrateError, MigrateResult};
pub use history::{HistoryRecord, BASELINE_CHECKSUM};
pub use orderer::{AppliedUnit, MigrationPlan, VersionOrderer};
pub use registry::{EmbeddedMigration, MigrationRegistry, NO_TRANSACTION_DIRECTIVE};
pub use statements::split_statements;
pub use unit::{BodyError, BodyFuture, BodyResult, FnBody, MigrationBody, MigrationUnit, SqlBody};
pub use version::Version;
