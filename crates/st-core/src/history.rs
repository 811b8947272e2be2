//! Recorded migration attempts.

use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Checksum stored on the marker row written by `baseline`.
pub const BASELINE_CHECKSUM: &str = "BASELINE";

/// One row of the history table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub version: Version,
    pub description: String,
    pub checksum: String,
    pub success: bool,
    pub applied_at: DateTime<Utc>,
    pub execution_time_ms: i64,
    /// Engine run that wrote the row. Known only for rows written by the
    /// current process; the history table does not persist it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_by: Option<String>,
}

impl HistoryRecord {
    /// Whether this row is a baseline marker rather than an executed unit.
    pub fn is_baseline(&self) -> bool {
        self.checksum == BASELINE_CHECKSUM
    }
}
