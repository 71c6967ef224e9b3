//! Scheduled job table capability (crontab backend).

use crate::command::Cmd;
use crate::error::{Error, Result};

/// Read and replace the scheduled job table.
pub trait Scheduler: Send + Sync {
    /// Current table lines, in order (empty when no table exists).
    fn entries(&self) -> Result<Vec<String>>;

    /// Replace the whole table with `entries`.
    fn install(&self, entries: &[String]) -> Result<()>;
}

/// The invoking user's crontab.
#[derive(Debug, Default)]
pub struct Crontab;

impl Scheduler for Crontab {
    fn entries(&self) -> Result<Vec<String>> {
        let output = Cmd::new("crontab").arg("-l").output()?;
        if !output.success() {
            if output.stderr.contains("no crontab for") {
                return Ok(Vec::new());
            }
            return Err(Error::CommandFailed {
                command: "crontab -l".to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout.lines().map(str::to_string).collect())
    }

    fn install(&self, entries: &[String]) -> Result<()> {
        let mut table = entries.join("\n");
        table.push('\n');
        Cmd::new("crontab").arg("-").stdin(table).run()?;
        Ok(())
    }
}
