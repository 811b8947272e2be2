//! Info command implementation

use anyhow::Result;
use st_engine::{InfoReport, UnitState};

use crate::cli::{GlobalArgs, InfoArgs, OutputFormat};
use crate::commands::common;

/// Execute the info command
pub(crate) async fn execute(args: &InfoArgs, global: &GlobalArgs) -> Result<()> {
    let (engine, registry) = common::setup(global).await?;
    let report = engine.info(&registry).await?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &InfoReport) {
    if report.entries.is_empty() {
        println!("No migrations found.");
        return;
    }

    let rows: Vec<Vec<String>> = report
        .entries
        .iter()
        .map(|e| {
            vec![
                e.version.to_string(),
                e.description.clone(),
                match e.transactional {
                    Some(true) => "tx".to_string(),
                    Some(false) => "no-tx".to_string(),
                    None => "-".to_string(),
                },
                e.state.to_string(),
                e.applied_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    common::print_table(
        &["VERSION", "DESCRIPTION", "MODE", "STATE", "APPLIED AT"],
        &rows,
    );

    println!();
    println!(
        "{} applied, {} pending, {} failed, {} missing",
        report.count(UnitState::Success) + report.count(UnitState::Baselined),
        report.count(UnitState::Pending),
        report.count(UnitState::Failed),
        report.count(UnitState::Missing)
    );
}
