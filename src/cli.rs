use clap::Parser;
use declarative::FailurePolicy;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hostform")]
#[command(version)]
#[command(about = "Converge a web host to a declared desired state", long_about = None)]
pub struct Cli {
    /// Desired-state configuration file (TOML)
    pub config: PathBuf,

    /// Check every step and print the would-be report without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Only run matching steps: `kind` or `kind.name` (e.g. `file`, `cert.example.com`)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Abort before starting any step once this many seconds have passed
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Stop at the first failure, including best-effort steps
    #[arg(long, conflicts_with = "keep_going")]
    pub fail_fast: bool,

    /// Record failures and keep going, including structural steps
    #[arg(long)]
    pub keep_going: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Failure policy override; `None` keeps each step's default
    pub fn policy(&self) -> Option<FailurePolicy> {
        if self.fail_fast {
            Some(FailurePolicy::StopOnFirstFailure)
        } else if self.keep_going {
            Some(FailurePolicy::ContinueAndCollect)
        } else {
            None
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}
