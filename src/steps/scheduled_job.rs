//! Scheduled job table entry

use super::tool;
use anyhow::Result;
use declarative::{CheckResult, Step, StepContext};
use hostkit::Host;

/// One `<schedule> <command>` line in the scheduler table, never duplicated
#[derive(Debug, Clone)]
pub struct ScheduledJobInstall {
    pub name: String,
    pub line: String,
}

fn contains(entries: &[String], line: &str) -> bool {
    entries.iter().any(|entry| entry.trim() == line)
}

impl Step<Host> for ScheduledJobInstall {
    fn id(&self) -> String {
        format!("cron:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Schedule `{}`", self.line)
    }

    fn kind(&self) -> &'static str {
        "cron"
    }

    fn rollback_hint(&self) -> Option<String> {
        Some(format!("crontab -e and remove `{}`", self.line))
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        match ctx.host.scheduler.entries() {
            Ok(entries) => CheckResult::from_bool(contains(&entries, &self.line), "entry missing"),
            Err(e) => CheckResult::unknown(e.to_string()),
        }
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        let mut entries = ctx.host.scheduler.entries().map_err(tool("crontab"))?;
        if contains(&entries, &self.line) {
            return Ok(());
        }
        entries.push(self.line.clone());
        ctx.host
            .scheduler
            .install(&entries)
            .map_err(tool("crontab"))?;
        Ok(())
    }
}
