//! Migrate command implementation

use anyhow::Result;
use st_engine::RunOptions;

use crate::cli::{GlobalArgs, MigrateArgs, OutputFormat};
use crate::commands::common::{self, parse_version};

/// Execute the migrate command
pub(crate) async fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let target = args.target.as_deref().map(parse_version).transpose()?;
    let (engine, registry) = common::setup(global).await?;

    let report = engine.run(&registry, &RunOptions { target }).await?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            for entry in &report.applied {
                println!(
                    "  applied {} ({}) in {}ms",
                    entry.version, entry.description, entry.execution_time_ms
                );
            }
            println!(
                "Applied {} migration(s); {} already applied, {} baselined",
                report.applied_count(),
                report.already_applied,
                report.baselined
            );
            if report.missing > 0 {
                println!(
                    "{} recorded migration(s) are no longer registered",
                    report.missing
                );
            }
            if report.above_target > 0 {
                println!("{} migration(s) above target left pending", report.above_target);
            }
        }
    }
    Ok(())
}
