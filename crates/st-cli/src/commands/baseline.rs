//! Baseline command implementation

use anyhow::Result;

use crate::cli::{BaselineArgs, GlobalArgs};
use crate::commands::common::{self, parse_version};

/// Execute the baseline command
pub(crate) async fn execute(args: &BaselineArgs, global: &GlobalArgs) -> Result<()> {
    let version = parse_version(&args.version)?;
    let (engine, _registry) = common::setup(global).await?;

    let record = engine.baseline(&version, &args.description).await?;
    println!("Baselined database at version {}", record.version);
    Ok(())
}
