//! The migration runner.

use crate::history::HistoryStore;
use crate::lock::MigrationLock;
use crate::report::{AppliedEntry, InfoEntry, InfoReport, RunReport, UnitState, ValidationReport};
use st_core::config::DEFAULT_HISTORY_TABLE;
use st_core::{
    BodyError, Config, HistoryRecord, MigrateError, MigrateResult, MigrationRegistry,
    MigrationUnit, Version, VersionOrderer,
};
use futures::FutureExt;
use st_db::MigrationConnection;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub history_table: String,
    pub lock_key: i64,
    pub lock_timeout: Duration,
    pub lock_retry_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            history_table: config.history.table.clone(),
            lock_key: config.lock.key,
            lock_timeout: Duration::from_millis(config.lock.timeout_ms),
            lock_retry_interval: Duration::from_millis(config.lock.retry_interval_ms),
        }
    }
}

impl EngineConfig {
    pub fn with_history_table(mut self, table: impl Into<String>) -> Self {
        self.history_table = table.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

/// Options for a single `run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after this version; later pending units stay pending
    pub target: Option<Version>,
}

/// Applies registered units to one database session.
pub struct ExecutionEngine {
    conn: Arc<dyn MigrationConnection>,
    history: HistoryStore,
    lock: MigrationLock,
    run_id: String,
}

impl ExecutionEngine {
    pub fn new(conn: Arc<dyn MigrationConnection>, config: EngineConfig) -> Self {
        let table = if config.history_table.is_empty() {
            DEFAULT_HISTORY_TABLE.to_string()
        } else {
            config.history_table
        };
        Self {
            conn,
            history: HistoryStore::new(table),
            lock: MigrationLock::new(
                config.lock_key,
                config.lock_timeout,
                config.lock_retry_interval,
            ),
            run_id: format!("stratum-{}", uuid::Uuid::new_v4()),
        }
    }

    /// Identity written into reports and logs for this engine instance.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Apply every pending unit in ascending version order.
    ///
    /// Registry errors surface before the database is touched. The lock is
    /// held for the whole run and released whatever the outcome, panics
    /// included.
    pub async fn run(
        &self,
        registry: &MigrationRegistry,
        options: &RunOptions,
    ) -> MigrateResult<RunReport> {
        let units = registry.discover()?;
        let conn = self.conn.as_ref();
        log::info!(
            "Starting migration run {} against {} ({} unit(s) registered)",
            self.run_id,
            conn.db_type(),
            units.len()
        );

        self.locked(self.run_locked(&units, options)).await
    }

    /// Run `work` while holding the migration lock.
    ///
    /// A panic inside `work` still releases the lock before it resumes
    /// unwinding.
    async fn locked<T>(&self, work: impl Future<Output = MigrateResult<T>>) -> MigrateResult<T> {
        self.lock.acquire(self.conn.as_ref(), &self.run_id).await?;
        let outcome = AssertUnwindSafe(work).catch_unwind().await;
        self.release_lock().await;
        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    async fn run_locked(
        &self,
        units: &[MigrationUnit],
        options: &RunOptions,
    ) -> MigrateResult<RunReport> {
        let started = Instant::now();
        let conn = self.conn.as_ref();

        self.history.ensure_initialized(conn).await?;
        let history = self.history.load_applied(conn).await?;
        refuse_unresolved_failure(&history)?;

        let plan = VersionOrderer::partition(units, &history, options.target.as_ref())?;
        plan.verify_checksums()?;

        let mut applied = Vec::with_capacity(plan.pending.len());
        for unit in &plan.pending {
            match self.apply_unit(unit).await {
                Ok(entry) => applied.push(entry),
                Err(e) => {
                    if !applied.is_empty() {
                        log::info!(
                            "Applied {} unit(s) before {} failed",
                            applied.len(),
                            unit.version()
                        );
                    }
                    return Err(e);
                }
            }
        }

        let report = RunReport {
            applied_by: self.run_id.clone(),
            applied,
            already_applied: plan.applied.len(),
            baselined: plan.baselined.len(),
            missing: plan.missing.len(),
            above_target: plan.above_target.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log::info!(
            "Migration run complete: {} applied, {} already applied",
            report.applied_count(),
            report.already_applied
        );
        Ok(report)
    }

    async fn apply_unit(&self, unit: &MigrationUnit) -> MigrateResult<AppliedEntry> {
        log::info!(
            "Applying migration {} ({}){}",
            unit.version(),
            unit.description(),
            if unit.is_transactional() {
                ""
            } else {
                " [non-transactional]"
            }
        );
        let execution_time_ms = if unit.is_transactional() {
            self.apply_transactional(unit).await?
        } else {
            self.apply_non_transactional(unit).await?
        };
        Ok(AppliedEntry {
            version: unit.version().clone(),
            description: unit.description().to_string(),
            execution_time_ms,
        })
    }

    /// Body and history row commit together or not at all.
    async fn apply_transactional(&self, unit: &MigrationUnit) -> MigrateResult<i64> {
        let conn = self.conn.as_ref();
        conn.begin().await?;

        let started = Instant::now();
        let outcome = match AssertUnwindSafe(unit.apply(conn)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                log::error!("Migration {} panicked; rolling back", unit.version());
                self.rollback(unit).await;
                panic::resume_unwind(payload)
            }
        };
        if let Err(e) = outcome {
            self.rollback(unit).await;
            log::error!("Migration {} failed and was rolled back: {}", unit.version(), e);
            return Err(match e {
                BodyError::PreexistingState(message) => MigrateError::PreexistingState {
                    version: unit.version().clone(),
                    message,
                },
                source => MigrateError::TransactionalExecution {
                    version: unit.version().clone(),
                    source,
                },
            });
        }
        let elapsed = elapsed_ms(started);

        if let Err(e) = self
            .history
            .record_attempt(conn, unit, true, elapsed, &self.run_id)
            .await
        {
            self.rollback(unit).await;
            return Err(e);
        }
        conn.commit().await?;
        Ok(elapsed)
    }

    /// No transaction; the outcome is recorded either way before returning.
    async fn apply_non_transactional(&self, unit: &MigrationUnit) -> MigrateResult<i64> {
        let conn = self.conn.as_ref();
        let started = Instant::now();
        let outcome = match AssertUnwindSafe(unit.apply(conn)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                log::error!(
                    "Non-transactional migration {} panicked; recording the failure",
                    unit.version()
                );
                if let Err(e) = self
                    .history
                    .record_attempt(conn, unit, false, elapsed_ms(started), &self.run_id)
                    .await
                {
                    log::error!("Could not record failed migration {}: {}", unit.version(), e);
                }
                panic::resume_unwind(payload)
            }
        };
        let elapsed = elapsed_ms(started);

        match outcome {
            Ok(()) => {
                self.history
                    .record_attempt(conn, unit, true, elapsed, &self.run_id)
                    .await?;
                Ok(elapsed)
            }
            Err(e) => {
                log::error!(
                    "Non-transactional migration {} failed; database may be partially changed: {}",
                    unit.version(),
                    e
                );
                self.history
                    .record_attempt(conn, unit, false, elapsed, &self.run_id)
                    .await?;
                Err(MigrateError::NonTransactionalExecution {
                    version: unit.version().clone(),
                    detail: e.to_string(),
                })
            }
        }
    }

    async fn rollback(&self, unit: &MigrationUnit) {
        if let Err(e) = self.conn.rollback().await {
            log::error!("Rollback of migration {} failed: {}", unit.version(), e);
        }
    }

    async fn release_lock(&self) {
        if let Err(e) = self.lock.release(self.conn.as_ref(), &self.run_id).await {
            log::error!("Failed to release migration lock {}: {}", self.lock.key(), e);
        }
    }

    /// Check the registry against recorded history without changing anything.
    ///
    /// A database with no history table validates as all-pending.
    pub async fn validate(&self, registry: &MigrationRegistry) -> MigrateResult<ValidationReport> {
        let units = registry.discover()?;
        let conn = self.conn.as_ref();

        let history = if self.history.exists(conn).await? {
            self.history.load_applied(conn).await?
        } else {
            Vec::new()
        };
        refuse_unresolved_failure(&history)?;

        let plan = VersionOrderer::partition(&units, &history, None)?;
        plan.verify_checksums()?;

        Ok(ValidationReport {
            verified: plan.applied.len(),
            pending: plan.pending.len(),
            missing: plan.missing.len(),
        })
    }

    /// State of every registered unit and every history row, read live.
    pub async fn info(&self, registry: &MigrationRegistry) -> MigrateResult<InfoReport> {
        let units = registry.discover()?;
        let conn = self.conn.as_ref();
        let history = if self.history.exists(conn).await? {
            self.history.load_applied(conn).await?
        } else {
            Vec::new()
        };
        Ok(build_info(&units, &history))
    }

    /// Mark a failed non-transactional unit as manually resolved.
    pub async fn repair(
        &self,
        registry: &MigrationRegistry,
        version: &Version,
    ) -> MigrateResult<()> {
        let units = registry.discover()?;
        let current = units.iter().find(|u| u.version() == version);
        self.locked(self.repair_locked(version, current)).await
    }

    async fn repair_locked(
        &self,
        version: &Version,
        current: Option<&MigrationUnit>,
    ) -> MigrateResult<()> {
        let conn = self.conn.as_ref();
        if !self.history.exists(conn).await?
            || !self.history.mark_repaired(conn, version, current).await?
        {
            return Err(MigrateError::RepairTargetNotFound {
                version: version.clone(),
            });
        }
        log::info!("Marked migration {} as repaired", version);
        Ok(())
    }

    /// Declare an existing database to be at `version` without running
    /// anything up to it. Only allowed while the history is empty.
    pub async fn baseline(
        &self,
        version: &Version,
        description: &str,
    ) -> MigrateResult<HistoryRecord> {
        self.locked(self.baseline_locked(version, description)).await
    }

    async fn baseline_locked(
        &self,
        version: &Version,
        description: &str,
    ) -> MigrateResult<HistoryRecord> {
        let conn = self.conn.as_ref();
        self.history.ensure_initialized(conn).await?;
        let count = self.history.count(conn).await?;
        if count > 0 {
            return Err(MigrateError::HistoryNotEmpty { count });
        }
        let record = self
            .history
            .insert_baseline(conn, version, description, &self.run_id)
            .await?;
        log::info!("Baselined database at version {}", version);
        Ok(record)
    }
}

/// A `success=false` row blocks every further run until repaired.
fn refuse_unresolved_failure(history: &[HistoryRecord]) -> MigrateResult<()> {
    match history.iter().find(|r| !r.success) {
        Some(failed) => Err(MigrateError::NonTransactionalExecution {
            version: failed.version.clone(),
            detail: "an earlier attempt failed and has not been repaired".to_string(),
        }),
        None => Ok(()),
    }
}

fn build_info(units: &[MigrationUnit], history: &[HistoryRecord]) -> InfoReport {
    let recorded: BTreeMap<&Version, &HistoryRecord> =
        history.iter().map(|r| (&r.version, r)).collect();
    let baseline = history
        .iter()
        .filter(|r| r.is_baseline())
        .map(|r| &r.version)
        .max();

    let mut entries: BTreeMap<Version, InfoEntry> = BTreeMap::new();
    for unit in units {
        let record = recorded.get(unit.version()).copied();
        let state = match record {
            Some(r) if r.is_baseline() => UnitState::Baselined,
            Some(r) if r.success => UnitState::Success,
            Some(_) => UnitState::Failed,
            None if baseline.is_some_and(|b| unit.version() <= b) => UnitState::Baselined,
            None => UnitState::Pending,
        };
        entries.insert(
            unit.version().clone(),
            InfoEntry {
                version: unit.version().clone(),
                description: unit.description().to_string(),
                state,
                transactional: Some(unit.is_transactional()),
                checksum: unit.checksum().to_string(),
                applied_at: record.map(|r| r.applied_at),
                execution_time_ms: record.map(|r| r.execution_time_ms),
            },
        );
    }

    for record in history {
        if entries.contains_key(&record.version) {
            continue;
        }
        let state = if record.is_baseline() {
            UnitState::Baselined
        } else if record.success {
            UnitState::Missing
        } else {
            UnitState::Failed
        };
        entries.insert(
            record.version.clone(),
            InfoEntry {
                version: record.version.clone(),
                description: record.description.clone(),
                state,
                transactional: None,
                checksum: record.checksum.clone(),
                applied_at: Some(record.applied_at),
                execution_time_ms: Some(record.execution_time_ms),
            },
        );
    }

    InfoReport {
        entries: entries.into_values().collect(),
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
