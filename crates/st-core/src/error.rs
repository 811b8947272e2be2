//! Error taxonomy for the migration engine
//!
//! Registry and ordering errors surface before any database mutation.
//! Execution errors halt the chain at the failing unit.

use crate::unit::BodyError;
use crate::version::Version;
use st_db::DbError;
use thiserror::Error;

/// Migration engine errors
#[derive(Error, Debug)]
pub enum MigrateError {
    /// M001: A version string could not be parsed
    #[error("[M001] Malformed migration version '{input}': {reason}")]
    MalformedVersion { input: String, reason: String },

    /// M002: Two units share a version
    #[error("[M002] Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: Version,
        first: String,
        second: String,
    },

    /// M003: A new unit sorts behind an already-recorded one
    #[error("[M003] Migration {version} sorts before already-recorded version {highest_recorded}; new migrations must come after every applied one")]
    OutOfOrder {
        version: Version,
        highest_recorded: Version,
    },

    /// M004: An applied unit's body changed since it ran
    #[error("[M004] Checksum mismatch for migration {version}: recorded {recorded}, computed {computed}")]
    ChecksumMismatch {
        version: Version,
        recorded: String,
        computed: String,
    },

    /// M005: Another run holds the migration lock
    #[error("[M005] Could not acquire migration lock {key} within {waited_ms}ms; another instance is migrating")]
    LockContention { key: i64, waited_ms: u64 },

    /// M006: A transactional unit failed and was rolled back
    #[error("[M006] Migration {version} failed and was rolled back (safe to retry): {source}")]
    TransactionalExecution {
        version: Version,
        #[source]
        source: BodyError,
    },

    /// M007: A non-transactional unit failed; needs manual repair
    #[error("[M007] Non-transactional migration {version} failed: {detail}. Fix the database by hand, then run `repair {version}`")]
    NonTransactionalExecution { version: Version, detail: String },

    /// M008: A unit body found state inconsistent with its assumptions
    #[error("[M008] Migration {version} found unexpected pre-existing state: {message}")]
    PreexistingState { version: Version, message: String },

    /// M009: Baseline requested on a database with recorded history
    #[error("[M009] Cannot baseline: history table already holds {count} row(s)")]
    HistoryNotEmpty { count: usize },

    /// M010: Repair requested for a version with no failed record
    #[error("[M010] No failed history record for version {version}")]
    RepairTargetNotFound { version: Version },

    /// M011: Bookkeeping or lock statement failed outside any unit body
    #[error("[M011] Migration bookkeeping failed: {0}")]
    Database(#[from] DbError),

    /// M012: Migration source could not be read
    #[error("[M012] Failed to read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Invalid configuration value
    #[error("[E002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E003: Configuration YAML parse error
    #[error("[E003] Failed to parse config: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for MigrateError
pub type MigrateResult<T> = Result<T, MigrateError>;

impl MigrateError {
    /// Taxonomy class name shown to operators.
    pub fn class_name(&self) -> &'static str {
        match self {
            MigrateError::MalformedVersion { .. } => "MalformedVersionError",
            MigrateError::DuplicateVersion { .. } => "DuplicateVersionError",
            MigrateError::OutOfOrder { .. } => "OutOfOrderMigrationError",
            MigrateError::ChecksumMismatch { .. } => "ChecksumMismatchError",
            MigrateError::LockContention { .. } => "LockContentionError",
            MigrateError::TransactionalExecution { .. } => "TransactionalExecutionError",
            MigrateError::NonTransactionalExecution { .. } => "NonTransactionalExecutionError",
            MigrateError::PreexistingState { .. } => "PreexistingStateError",
            MigrateError::HistoryNotEmpty { .. } => "HistoryNotEmptyError",
            MigrateError::RepairTargetNotFound { .. } => "RepairTargetNotFoundError",
            MigrateError::Database(_) => "DatabaseError",
            MigrateError::Io { .. } => "IoError",
            MigrateError::ConfigNotFound { .. }
            | MigrateError::ConfigInvalid { .. }
            | MigrateError::YamlParse(_) => "ConfigError",
        }
    }

    /// The migration version the error is about, when there is one.
    pub fn version(&self) -> Option<&Version> {
        match self {
            MigrateError::DuplicateVersion { version, .. }
            | MigrateError::OutOfOrder { version, .. }
            | MigrateError::ChecksumMismatch { version, .. }
            | MigrateError::TransactionalExecution { version, .. }
            | MigrateError::NonTransactionalExecution { version, .. }
            | MigrateError::PreexistingState { version, .. }
            | MigrateError::RepairTargetNotFound { version } => Some(version),
            _ => None,
        }
    }

    /// Whether re-running without operator intervention is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MigrateError::LockContention { .. }
                | MigrateError::TransactionalExecution { .. }
                | MigrateError::PreexistingState { .. }
        )
    }
}
