//! Results returned by engine operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use st_core::Version;

/// One unit applied during a run.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedEntry {
    pub version: Version,
    pub description: String,
    pub execution_time_ms: i64,
}

/// Outcome of a successful `run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identity of the run, carried on every history row it wrote
    pub applied_by: String,
    pub applied: Vec<AppliedEntry>,
    /// Units whose success row was already present
    pub already_applied: usize,
    /// Units covered by a baseline marker
    pub baselined: usize,
    /// History rows with no registered unit
    pub missing: usize,
    /// Pending units left alone because they sort above the target
    pub above_target: usize,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Outcome of a successful `validate`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Applied units whose checksum matched
    pub verified: usize,
    pub pending: usize,
    pub missing: usize,
}

/// State of one version as shown by `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Success,
    Failed,
    Pending,
    Baselined,
    Missing,
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnitState::Success => "Success",
            UnitState::Failed => "Failed",
            UnitState::Pending => "Pending",
            UnitState::Baselined => "Baselined",
            UnitState::Missing => "Missing",
        };
        f.write_str(s)
    }
}

/// One row of `info` output.
#[derive(Debug, Clone, Serialize)]
pub struct InfoEntry {
    pub version: Version,
    pub description: String,
    pub state: UnitState,
    /// `None` for history rows with no registered unit
    pub transactional: Option<bool>,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,
}

/// Every registered unit and every history row, ascending by version.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InfoReport {
    pub entries: Vec<InfoEntry>,
}

impl InfoReport {
    pub fn count(&self, state: UnitState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }
}
