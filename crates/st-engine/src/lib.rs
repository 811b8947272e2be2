//! st-engine - Migration execution for Stratum
//!
//! Drives the units discovered by `st-core` against one database session:
//! serializes concurrent runs with a lock, keeps the history table, and
//! applies pending units in order with the transaction handling each one
//! declares.

pub mod engine;
pub mod history;
pub mod lock;
pub mod report;

pub use engine::{EngineConfig, ExecutionEngine, RunOptions};
pub use history::HistoryStore;
pub use lock::MigrationLock;
pub use report::{AppliedEntry, InfoEntry, InfoReport, RunReport, UnitState, ValidationReport};
