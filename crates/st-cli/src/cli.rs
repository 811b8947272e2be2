//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Stratum - versioned, checksummed, forward-only database migrations
#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding stratum.yml and the migration locations
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// DuckDB database file (overrides database.path)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Postgres connection URL (overrides database.url and selects postgres)
    #[arg(long, global = true, env = "STRATUM_DATABASE_URL")]
    pub url: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply every pending migration in version order
    Migrate(MigrateArgs),

    /// Show applied, pending, failed and missing migrations
    Info(InfoArgs),

    /// Verify checksums and ordering without executing anything
    Validate(ValidateArgs),

    /// Mark a failed non-transactional migration as manually fixed
    Repair(RepairArgs),

    /// Mark an existing database as already at a version
    Baseline(BaselineArgs),
}

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Stop after this version
    #[arg(short, long)]
    pub target: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

/// Arguments for the repair command
#[derive(Args, Debug)]
pub struct RepairArgs {
    /// Version whose failed record should be marked resolved
    pub version: String,
}

/// Arguments for the baseline command
#[derive(Args, Debug)]
pub struct BaselineArgs {
    /// Version the database is already at
    pub version: String,

    /// Description stored on the baseline row
    #[arg(long, default_value = "<< baseline >>")]
    pub description: String,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
