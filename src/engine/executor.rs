//! Execution engine - runs a plan with terminal output

use anyhow::{Context, Result};
use declarative::{ExecuteOptions, Plan, Report, execute};
use hostkit::Host;

use super::differ::display_report;
use crate::progress::ConsoleProgress;

/// Where the report goes once the plan has run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Progress lines and the report table
    Human,
    /// Failures only
    Quiet,
    /// Failures on stderr, the report as JSON on stdout
    Json,
}

/// Execute the plan and print its report
pub fn run(plan: &Plan<Host>, host: &Host, opts: &ExecuteOptions, output: Output) -> Result<Report> {
    let mut progress = ConsoleProgress::new(output != Output::Human);
    let report = execute(plan, host, opts, &mut progress);

    match output {
        Output::Human => display_report(&report),
        Output::Quiet => {}
        Output::Json => println!("{}", to_json(&report)?),
    }
    Ok(report)
}

pub fn to_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}
