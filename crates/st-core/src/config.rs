//! Configuration types and parsing for stratum.yml

use crate::error::{MigrateError, MigrateResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration from stratum.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Target database connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Directories scanned for `V<version>__<description>.sql` files,
    /// relative to the config file's directory
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,

    /// History table settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Cross-process lock settings
    #[serde(default)]
    pub lock: LockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            locations: default_locations(),
            history: HistoryConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

/// Database type selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// DuckDB (default)
    #[default]
    DuckDb,
    /// PostgreSQL
    Postgres,
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbType::DuckDb => write!(f, "duckdb"),
            DbType::Postgres => write!(f, "postgres"),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database type (duckdb or postgres)
    #[serde(rename = "type", default)]
    pub db_type: DbType,

    /// DuckDB file path or :memory:
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Postgres connection URL
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DbType::default(),
            path: default_db_path(),
            url: None,
        }
    }
}

/// History table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Table name, optionally schema-qualified
    #[serde(default = "default_history_table")]
    pub table: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            table: default_history_table(),
        }
    }
}

/// Migration lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Lock identifier shared by every instance migrating the same database
    #[serde(default = "default_lock_key")]
    pub key: i64,

    /// How long to wait for the lock before giving up
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,

    /// Pause between acquisition attempts
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key: default_lock_key(),
            timeout_ms: default_lock_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

const DEFAULT_DB_PATH: &str = ":memory:";

/// Default history table name.
pub const DEFAULT_HISTORY_TABLE: &str = "stratum_schema_history";

/// Default lock key.
pub const DEFAULT_LOCK_KEY: i64 = 0x5354_5241_5455_4d;

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_locations() -> Vec<String> {
    vec!["migrations".to_string()]
}

fn default_history_table() -> String {
    DEFAULT_HISTORY_TABLE.to_string()
}

fn default_lock_key() -> i64 {
    DEFAULT_LOCK_KEY
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

fn default_retry_interval_ms() -> u64 {
    250
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> MigrateResult<Self> {
        if !path.exists() {
            return Err(MigrateError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MigrateError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for stratum.yml or stratum.yaml
    pub fn load_from_dir(dir: &Path) -> MigrateResult<Self> {
        let yml_path = dir.join("stratum.yml");
        let yaml_path = dir.join("stratum.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(MigrateError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> MigrateResult<()> {
        let invalid = |message: &str| {
            Err(MigrateError::ConfigInvalid {
                message: message.to_string(),
            })
        };

        if self.history.table.trim().is_empty() {
            return invalid("history.table cannot be empty");
        }
        if self.lock.retry_interval_ms == 0 {
            return invalid("lock.retry_interval_ms must be greater than zero");
        }
        if self.database.db_type == DbType::Postgres && self.database.url.is_none() {
            return invalid("database.url is required when database.type is postgres");
        }
        Ok(())
    }

    /// Migration directories resolved against `root`
    pub fn locations_absolute(&self, root: &Path) -> Vec<PathBuf> {
        self.locations.iter().map(|l| root.join(l)).collect()
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
