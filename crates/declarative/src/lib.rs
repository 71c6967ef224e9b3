//! # Declarative
//!
//! A framework for idempotent, ordered host provisioning.
//!
//! This crate provides the core abstractions for describing units of
//! provisioning work, running them in a fixed order against a host, and
//! reporting what happened to each of them.
//!
//! ## Core Concepts
//!
//! - **Step**: A named unit of work with a `check`/`apply` contract
//! - **CheckResult**: Whether the host already satisfies a step
//! - **Plan**: An ordered list of steps, resolved once before execution
//! - **Executor**: Runs a plan sequentially under a failure policy
//! - **Report**: One outcome per planned step, in plan order
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     CheckResult, ExecuteOptions, NoProgress, Plan, Step, StepContext, execute,
//! };
//!
//! #[derive(Debug)]
//! struct Marker { path: std::path::PathBuf }
//!
//! impl Step<()> for Marker {
//!     fn id(&self) -> String { format!("marker:{}", self.path.display()) }
//!     fn description(&self) -> String { "Create marker file".into() }
//!     fn kind(&self) -> &'static str { "marker" }
//!
//!     fn check(&self, _ctx: &StepContext<'_, ()>) -> CheckResult {
//!         CheckResult::from_bool(self.path.exists(), "marker missing")
//!     }
//!
//!     fn apply(&self, _ctx: &StepContext<'_, ()>) -> anyhow::Result<()> {
//!         std::fs::write(&self.path, b"")?;
//!         Ok(())
//!     }
//! }
//!
//! let mut plan = Plan::new();
//! plan.push(Box::new(Marker { path: "/tmp/marker".into() }));
//!
//! let report = execute(&plan, &(), &ExecuteOptions::default(), &mut NoProgress);
//! assert!(report.is_success());
//! ```
//!
//! ## Host capabilities
//!
//! Steps are generic over a host type `H`. The crate never touches the
//! machine itself; everything a step needs (package manager, service
//! manager, ...) is reached through `H`, which lets the same plan run
//! against real tools or in-memory fakes.

pub mod context;
pub mod executor;
pub mod planner;
pub mod report;
pub mod step;
pub mod types;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback, StepContext};
pub use executor::execute;
pub use planner::Plan;
pub use report::{Report, ReportSummary, SkipReason, StepOutcome, StepStatus};
pub use step::{BoxedStep, Step};
pub use types::{CheckResult, Criticality, ExecuteOptions, FailurePolicy, Precondition};
