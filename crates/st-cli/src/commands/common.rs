//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use st_core::{Config, DbType, MigrateError, MigrationRegistry, Version};
use st_db::{DuckDbBackend, MigrationConnection};
use st_engine::{EngineConfig, ExecutionEngine};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) u8);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // control flow only; nothing to print
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Process exit code for each migration error class.
pub(crate) fn exit_code_for(err: &MigrateError) -> u8 {
    match err {
        MigrateError::MalformedVersion { .. } => 2,
        MigrateError::DuplicateVersion { .. } => 3,
        MigrateError::OutOfOrder { .. } => 4,
        MigrateError::ChecksumMismatch { .. } => 5,
        MigrateError::LockContention { .. } => 6,
        MigrateError::TransactionalExecution { .. } => 7,
        MigrateError::NonTransactionalExecution { .. } => 8,
        MigrateError::PreexistingState { .. } => 9,
        MigrateError::RepairTargetNotFound { .. } | MigrateError::HistoryNotEmpty { .. } => 10,
        MigrateError::Database(_)
        | MigrateError::Io { .. }
        | MigrateError::ConfigNotFound { .. }
        | MigrateError::ConfigInvalid { .. }
        | MigrateError::YamlParse(_) => 1,
    }
}

/// Print an error to stderr and pick the exit code.
pub(crate) fn report_error(err: &anyhow::Error) -> u8 {
    if let Some(code) = err.downcast_ref::<ExitCode>() {
        return code.0;
    }
    if let Some(migrate) = err.downcast_ref::<MigrateError>() {
        eprintln!("error[{}]: {}", migrate.class_name(), migrate);
        return exit_code_for(migrate);
    }
    eprintln!("error: {err:#}");
    1
}

/// Configuration plus the directory relative paths resolve against.
pub(crate) struct LoadedConfig {
    pub(crate) config: Config,
    pub(crate) root: PathBuf,
}

/// Load stratum.yml (or the `--config` override) and apply flag overrides.
///
/// A project without a config file runs on defaults.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<LoadedConfig> {
    let project_dir = PathBuf::from(&global.project_dir);
    let (mut config, root) = match &global.config {
        Some(path) => {
            let path = PathBuf::from(path);
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| project_dir.clone());
            (Config::load(&path)?, root)
        }
        None => match Config::load_from_dir(&project_dir) {
            Ok(config) => (config, project_dir),
            Err(MigrateError::ConfigNotFound { .. }) => {
                log::debug!("No stratum.yml in {}; using defaults", project_dir.display());
                (Config::default(), project_dir)
            }
            Err(e) => return Err(e.into()),
        },
    };

    if let Some(path) = &global.database {
        config.database.db_type = DbType::DuckDb;
        config.database.path = path.clone();
    }
    if let Some(url) = &global.url {
        config.database.db_type = DbType::Postgres;
        config.database.url = Some(url.clone());
    }
    config.validate()?;

    Ok(LoadedConfig { config, root })
}

/// Open the configured database.
pub(crate) async fn connect(config: &Config) -> Result<Arc<dyn MigrationConnection>> {
    match config.database.db_type {
        DbType::DuckDb => {
            let db = DuckDbBackend::new(&config.database.path)
                .with_context(|| format!("Failed to open DuckDB at {}", config.database.path))?;
            Ok(Arc::new(db))
        }
        DbType::Postgres => connect_postgres(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(config: &Config) -> Result<Arc<dyn MigrationConnection>> {
    let url = config
        .database
        .url
        .as_deref()
        .context("database.url is required for postgres")?;
    let db = st_db::PostgresBackend::connect(url)
        .await
        .context("Failed to connect to Postgres")?;
    Ok(Arc::new(db))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_config: &Config) -> Result<Arc<dyn MigrationConnection>> {
    anyhow::bail!("this build of stratum has no postgres support; rebuild with --features postgres")
}

/// Registry over every configured migration location that exists.
pub(crate) fn build_registry(loaded: &LoadedConfig) -> MigrationRegistry {
    loaded
        .config
        .locations_absolute(&loaded.root)
        .into_iter()
        .fold(MigrationRegistry::new(), |registry, dir| {
            if dir.is_dir() {
                registry.register_dir(dir)
            } else {
                log::warn!("Migration location {} does not exist", dir.display());
                registry
            }
        })
}

/// Load config, connect, and build the engine and registry in one go.
pub(crate) async fn setup(global: &GlobalArgs) -> Result<(ExecutionEngine, MigrationRegistry)> {
    let loaded = load_config(global)?;
    let registry = build_registry(&loaded);
    let conn = connect(&loaded.config).await?;
    let engine = ExecutionEngine::new(conn, EngineConfig::from(&loaded.config));
    Ok((engine, registry))
}

/// Parse a version given on the command line.
pub(crate) fn parse_version(input: &str) -> Result<Version> {
    Ok(Version::parse(input)?)
}

/// Calculate column widths for table output.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a formatted table to stdout.
///
/// Columns are left-aligned and separated by two spaces, with a dashed line
/// under the header.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  ").trim_end());

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  ").trim_end());
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
