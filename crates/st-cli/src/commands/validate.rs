//! Validate command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, ValidateArgs};
use crate::commands::common;

/// Execute the validate command
pub(crate) async fn execute(_args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let (engine, registry) = common::setup(global).await?;
    let report = engine.validate(&registry).await?;

    println!(
        "Validation passed: {} applied migration(s) verified, {} pending",
        report.verified, report.pending
    );
    if report.missing > 0 {
        println!(
            "{} recorded migration(s) are no longer registered",
            report.missing
        );
    }
    Ok(())
}
