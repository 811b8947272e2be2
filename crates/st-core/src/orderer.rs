//! Diffing registered units against recorded history.

use crate::error::{MigrateError, MigrateResult};
use crate::history::HistoryRecord;
use crate::unit::MigrationUnit;
use crate::version::Version;
use std::collections::BTreeMap;

/// A registered unit together with the history row that recorded it.
#[derive(Debug, Clone)]
pub struct AppliedUnit {
    pub unit: MigrationUnit,
    pub record: HistoryRecord,
}

/// The result of comparing the registry with the history table.
#[derive(Debug, Default)]
pub struct MigrationPlan {
    /// Units with a `success=true` row, ascending.
    pub applied: Vec<AppliedUnit>,
    /// Units to execute now, ascending.
    pub pending: Vec<MigrationUnit>,
    /// Units covered by a baseline marker; never executed.
    pub baselined: Vec<MigrationUnit>,
    /// Rows with `success=false`, awaiting repair.
    pub failed: Vec<HistoryRecord>,
    /// Successful rows whose version the registry no longer carries.
    pub missing: Vec<HistoryRecord>,
    /// Units beyond the requested target, left for a later run.
    pub above_target: Vec<MigrationUnit>,
}

impl MigrationPlan {
    /// Compare each applied unit's checksum with its recorded one.
    ///
    /// Returns the lowest mismatching version so operators see the oldest
    /// drift first.
    pub fn verify_checksums(&self) -> MigrateResult<()> {
        for applied in &self.applied {
            if applied.unit.checksum() != applied.record.checksum {
                return Err(MigrateError::ChecksumMismatch {
                    version: applied.unit.version().clone(),
                    recorded: applied.record.checksum.clone(),
                    computed: applied.unit.checksum().to_string(),
                });
            }
        }
        Ok(())
    }

    /// The lowest `success=false` row, if any.
    pub fn first_unresolved_failure(&self) -> Option<&HistoryRecord> {
        self.failed.first()
    }
}

/// Total ordering over migration units.
pub struct VersionOrderer;

impl VersionOrderer {
    /// Sort units ascending, rejecting duplicate versions.
    pub fn order(mut units: Vec<MigrationUnit>) -> MigrateResult<Vec<MigrationUnit>> {
        units.sort_by(|a, b| a.version().cmp(b.version()));
        for pair in units.windows(2) {
            if pair[0].version() == pair[1].version() {
                return Err(MigrateError::DuplicateVersion {
                    version: pair[1].version().clone(),
                    first: pair[0].origin().to_string(),
                    second: pair[1].origin().to_string(),
                });
            }
        }
        Ok(units)
    }

    /// Partition ordered units against history.
    ///
    /// A unit with no row whose version sorts below the highest recorded
    /// version is out of order, unless a baseline marker covers it. History
    /// rows the registry no longer carries are tolerated and logged.
    pub fn partition(
        units: &[MigrationUnit],
        history: &[HistoryRecord],
        target: Option<&Version>,
    ) -> MigrateResult<MigrationPlan> {
        let mut plan = MigrationPlan::default();

        let recorded: BTreeMap<&Version, &HistoryRecord> =
            history.iter().map(|r| (&r.version, r)).collect();
        let baseline = history
            .iter()
            .filter(|r| r.is_baseline())
            .map(|r| &r.version)
            .max();
        let highest = history
            .iter()
            .filter(|r| !r.is_baseline())
            .map(|r| &r.version)
            .max();

        for unit in units {
            let version = unit.version();
            match recorded.get(version) {
                Some(record) if record.is_baseline() => plan.baselined.push(unit.clone()),
                Some(record) if record.success => plan.applied.push(AppliedUnit {
                    unit: unit.clone(),
                    record: (*record).clone(),
                }),
                // Failed rows are collected below; the unit itself is blocked.
                Some(_) => {}
                None if baseline.is_some_and(|b| version <= b) => {
                    plan.baselined.push(unit.clone())
                }
                None => {
                    if let Some(highest) = highest.filter(|h| version < *h) {
                        return Err(MigrateError::OutOfOrder {
                            version: version.clone(),
                            highest_recorded: highest.clone(),
                        });
                    }
                    if target.is_some_and(|t| version > t) {
                        plan.above_target.push(unit.clone());
                    } else {
                        plan.pending.push(unit.clone());
                    }
                }
            }
        }

        let known: BTreeMap<&Version, &MigrationUnit> =
            units.iter().map(|u| (u.version(), u)).collect();
        for record in recorded.values() {
            if !record.success {
                plan.failed.push((*record).clone());
            } else if !record.is_baseline() && !known.contains_key(&record.version) {
                log::warn!(
                    "Migration {} ({}) is recorded in history but no longer registered",
                    record.version,
                    record.description
                );
                plan.missing.push((*record).clone());
            }
        }

        Ok(plan)
    }
}

#[cfg(test)]
#[path = "orderer_test.rs"]
mod tests;
