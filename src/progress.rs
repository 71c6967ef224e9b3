//! Terminal progress for plan execution

use colored::Colorize;
use declarative::{ProgressCallback, Report, SkipReason, StepOutcome, StepStatus};

use crate::ui;

/// Prints one line per step as the executor reaches it
///
/// Quiet mode drops everything but failures.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_plan_start(&mut self, total: usize, dry_run: bool) {
        if self.quiet {
            return;
        }
        let mode = if dry_run { " (dry run)" } else { "" };
        ui::header(&format!("Provisioning: {total} steps{mode}"));
    }

    fn on_step_start(&mut self, index: usize, total: usize, id: &str, description: &str) {
        if self.quiet {
            return;
        }
        println!(
            "  {} {} — {}",
            format!("[{}/{}]", index + 1, total).dimmed(),
            id.bold(),
            description
        );
    }

    fn on_step_complete(&mut self, outcome: &StepOutcome) {
        let message = outcome.message.as_deref().unwrap_or_default();
        match &outcome.status {
            StepStatus::Failed => {
                eprintln!("    {} {} {}", "✗".red(), outcome.id, message.red());
            }
            _ if self.quiet => {}
            StepStatus::Applied => {
                println!(
                    "    {} applied {}",
                    "✓".green(),
                    ui::format_duration(outcome.duration_ms).dimmed()
                );
            }
            StepStatus::Skipped(SkipReason::AlreadySatisfied) => {
                println!("    {} already satisfied", "•".dimmed());
            }
            StepStatus::Skipped(SkipReason::DryRun) => {
                println!("    {} would apply: {}", "~".yellow(), message);
            }
            StepStatus::Skipped(SkipReason::PreconditionUnmet(reason)) => {
                println!("    {} skipped: {}", "⚠".yellow(), reason.yellow());
            }
            StepStatus::Skipped(SkipReason::Aborted(reason)) => {
                println!("  {} {} {}", "-".dimmed(), outcome.id.dimmed(), reason.dimmed());
            }
        }
    }

    fn on_plan_complete(&mut self, report: &Report) {
        if self.quiet {
            return;
        }
        let summary = report.summary();
        println!();
        if summary.is_success() {
            ui::success(&format!(
                "{} applied, {} already satisfied",
                summary.applied, summary.satisfied
            ));
        } else {
            ui::warn(&format!(
                "{} failed, {} aborted",
                summary.failed, summary.aborted
            ));
        }
    }
}
