//! Diff and report display

use colored::{ColoredString, Colorize};
use declarative::{Report, SkipReason, StepStatus};
use similar::{ChangeTag, TextDiff};
use std::io::{self, Write};

/// Print a unified line diff of `current` against `desired`
///
/// Diffs go to stderr; stdout carries only the report, which may be JSON.
pub fn show_text_diff(label: &str, current: &str, desired: &str) {
    let mut err = std::io::stderr().lock();
    if let Err(e) = write_text_diff(&mut err, label, current, desired) {
        log::debug!("Could not print diff for {label}: {e}");
    }
}

fn write_text_diff(
    out: &mut impl Write,
    label: &str,
    current: &str,
    desired: &str,
) -> io::Result<()> {
    writeln!(out, "    {} {}", "diff".dimmed(), label.bold())?;
    let diff = TextDiff::from_lines(current, desired);
    let mut changed = false;

    for change in diff.iter_all_changes() {
        let line = change.to_string_lossy();
        let line = line.trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Delete => {
                changed = true;
                writeln!(out, "    {}", format!("- {line}").red())?;
            }
            ChangeTag::Insert => {
                changed = true;
                writeln!(out, "    {}", format!("+ {line}").green())?;
            }
            ChangeTag::Equal => {}
        }
    }

    if !changed {
        writeln!(out, "    {}", "(files are identical)".dimmed())?;
    }
    Ok(())
}

fn symbol(status: &StepStatus) -> ColoredString {
    match status {
        StepStatus::Applied => "+".green(),
        StepStatus::Failed => "✗".red(),
        StepStatus::Skipped(SkipReason::AlreadySatisfied) => "✓".dimmed(),
        StepStatus::Skipped(SkipReason::DryRun) => "~".yellow(),
        StepStatus::Skipped(SkipReason::PreconditionUnmet(_)) => "!".yellow(),
        StepStatus::Skipped(SkipReason::Aborted(_)) => "-".dimmed(),
    }
}

/// Display the report as a table, one row per planned step
pub fn display_report(report: &Report) {
    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────────┐",
        "Report".bold()
    );
    println!("│");

    for outcome in report.iter() {
        let detail = match (&outcome.status, &outcome.message) {
            (StepStatus::Skipped(reason), _) => reason.to_string(),
            (_, Some(message)) => message.clone(),
            _ => String::new(),
        };
        println!(
            "│ {} {:<34} {:<8} {}",
            symbol(&outcome.status),
            outcome.id,
            outcome.status.label(),
            detail.dimmed()
        );
        if outcome.status.is_failed()
            && let Some(hint) = &outcome.rollback_hint
        {
            println!("│     {} {}", "hint:".yellow(), hint);
        }
    }

    let s = report.summary();
    println!("│");
    println!("├─────────────────────────────────────────────────────────┤");
    println!(
        "│ {} applied, {} satisfied, {} dry-run, {} unmet, {} aborted, {} failed",
        s.applied.to_string().green(),
        s.satisfied,
        s.dry_run.to_string().yellow(),
        s.precondition_unmet.to_string().yellow(),
        s.aborted,
        if s.failed > 0 {
            s.failed.to_string().red()
        } else {
            s.failed.to_string().normal()
        }
    );
    println!("└─────────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_text(current: &str, desired: &str) -> String {
        let mut out = Vec::new();
        write_text_diff(&mut out, "proxy-site", current, desired).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_diff_lists_changed_lines_only() {
        let text = diff_text("listen 80;\nserver_name a;\n", "listen 80;\nserver_name b;\n");
        assert!(text.contains("proxy-site"));
        assert!(text.contains("- server_name a;"));
        assert!(text.contains("+ server_name b;"));
        assert!(!text.contains("listen 80;"));
    }

    #[test]
    fn test_identical_files() {
        let text = diff_text("same\n", "same\n");
        assert!(text.contains("(files are identical)"));
    }
}
