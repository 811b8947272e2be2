//! Migration discovery.
//!
//! Units come from three places: explicit registration in code, static
//! `include_str!` lists compiled into the binary, and directories of
//! `V<version>__<description>.sql` files. Nothing is found by reflection;
//! the registry only knows what it was told about.

use crate::error::{MigrateError, MigrateResult};
use crate::orderer::VersionOrderer;
use crate::unit::MigrationUnit;
use crate::version::Version;
use std::path::{Path, PathBuf};

/// Line that marks a SQL file as non-transactional.
pub const NO_TRANSACTION_DIRECTIVE: &str = "-- stratum:no-transaction";

/// A SQL migration compiled into the binary.
pub struct EmbeddedMigration {
    /// Version string, e.g. `"0.50.24.8"`.
    pub version: &'static str,
    /// Operator-facing description.
    pub description: &'static str,
    /// `false` for statements that cannot run inside a transaction.
    pub transactional: bool,
    /// Raw SQL to execute.
    pub sql: &'static str,
}

enum Source {
    Unit(MigrationUnit),
    Sql {
        version: String,
        description: String,
        transactional: bool,
        sql: String,
    },
    Embedded(&'static [EmbeddedMigration]),
    Directory(PathBuf),
}

/// Collects migration sources and turns them into an ordered unit list.
#[derive(Default)]
pub struct MigrationRegistry {
    sources: Vec<Source>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fully built unit.
    pub fn register(mut self, unit: MigrationUnit) -> Self {
        self.sources.push(Source::Unit(unit));
        self
    }

    /// Register a SQL unit by version string; the version is parsed at discovery.
    pub fn register_sql(
        mut self,
        version: impl Into<String>,
        description: impl Into<String>,
        transactional: bool,
        sql: impl Into<String>,
    ) -> Self {
        self.sources.push(Source::Sql {
            version: version.into(),
            description: description.into(),
            transactional,
            sql: sql.into(),
        });
        self
    }

    /// Register a static list of embedded SQL migrations.
    pub fn register_embedded(mut self, migrations: &'static [EmbeddedMigration]) -> Self {
        self.sources.push(Source::Embedded(migrations));
        self
    }

    /// Register a directory scanned (recursively) at discovery time.
    pub fn register_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sources.push(Source::Directory(dir.into()));
        self
    }

    /// Build every unit, reject malformed or duplicate versions, and return
    /// them in ascending version order.
    pub fn discover(&self) -> MigrateResult<Vec<MigrationUnit>> {
        let mut units = Vec::new();
        for source in &self.sources {
            match source {
                Source::Unit(unit) => units.push(unit.clone()),
                Source::Sql {
                    version,
                    description,
                    transactional,
                    sql,
                } => units.push(MigrationUnit::from_sql(
                    Version::parse(version)?,
                    description.clone(),
                    *transactional,
                    sql.clone(),
                )),
                Source::Embedded(list) => {
                    for m in list.iter() {
                        units.push(
                            MigrationUnit::from_sql(
                                Version::parse(m.version)?,
                                m.description,
                                m.transactional,
                                m.sql,
                            )
                            .with_origin(format!("embedded:{}", m.version)),
                        );
                    }
                }
                Source::Directory(dir) => units.extend(load_dir(dir)?),
            }
        }

        let units = VersionOrderer::order(units)?;
        log::debug!("Discovered {} migration unit(s)", units.len());
        Ok(units)
    }
}

/// Load every `.sql` file under `dir`, sorted by path.
fn load_dir(dir: &Path) -> MigrateResult<Vec<MigrationUnit>> {
    let mut files = Vec::new();
    collect_sql_files(dir, &mut files)?;
    files.sort();

    let mut units = Vec::with_capacity(files.len());
    for path in files {
        units.push(load_file(&path)?);
    }
    Ok(units)
}

fn collect_sql_files(dir: &Path, out: &mut Vec<PathBuf>) -> MigrateResult<()> {
    let io_err = |source| MigrateError::Io {
        path: dir.display().to_string(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_sql_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "sql") {
            out.push(path);
        }
    }
    Ok(())
}

/// Parse `V<version>__<description>.sql` into a unit.
fn load_file(path: &Path) -> MigrateResult<MigrationUnit> {
    let file_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let (version, description) = parse_file_name(file_name)?;

    let sql = std::fs::read_to_string(path).map_err(|source| MigrateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let transactional = !sql
        .lines()
        .any(|line| line.trim().eq_ignore_ascii_case(NO_TRANSACTION_DIRECTIVE));

    Ok(
        MigrationUnit::from_sql(version, description, transactional, sql)
            .with_origin(path.display().to_string()),
    )
}

/// Split a file stem such as `V0_50_24_008__Add_archived_status`.
pub(crate) fn parse_file_name(stem: &str) -> MigrateResult<(Version, String)> {
    let malformed = |reason: &str| MigrateError::MalformedVersion {
        input: stem.to_string(),
        reason: reason.to_string(),
    };
    if !stem.starts_with(['V', 'v']) {
        return Err(malformed("migration file names must start with 'V'"));
    }
    let Some((version, description)) = stem.split_once("__") else {
        return Err(malformed(
            "expected '__' between version and description",
        ));
    };
    let version = Version::parse(version)?;
    let description = description.replace('_', " ").trim().to_string();
    if description.is_empty() {
        return Err(malformed("description is empty"));
    }
    Ok((version, description))
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
