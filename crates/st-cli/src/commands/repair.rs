//! Repair command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, RepairArgs};
use crate::commands::common::{self, parse_version};

/// Execute the repair command
pub(crate) async fn execute(args: &RepairArgs, global: &GlobalArgs) -> Result<()> {
    let version = parse_version(&args.version)?;
    let (engine, registry) = common::setup(global).await?;

    engine.repair(&registry, &version).await?;
    println!("Migration {version} marked as repaired; the next migrate will continue past it");
    Ok(())
}
