//! Step trait for declarative provisioning
//!
//! A Step is one idempotent unit of work: it can tell whether the host
//! already looks the way it wants, and it can make it so.

use crate::context::StepContext;
use crate::types::{CheckResult, Criticality, Precondition};
use anyhow::Result;
use std::fmt;

/// Core trait for provisioning steps
///
/// Every step provides:
/// - Identity (id, description, kind)
/// - State detection (`check`)
/// - State convergence (`apply`)
/// - Failure semantics (criticality, rollback hint)
///
/// Steps are stateless descriptors. Everything they touch on the host goes
/// through `H`, so the same step runs against real tools or fakes.
///
/// # Example
///
/// ```ignore
/// use declarative::{CheckResult, Step, StepContext};
///
/// #[derive(Debug)]
/// struct Touch { path: std::path::PathBuf }
///
/// impl Step<()> for Touch {
///     fn id(&self) -> String {
///         format!("touch:{}", self.path.display())
///     }
///
///     fn description(&self) -> String {
///         format!("Ensure {} exists", self.path.display())
///     }
///
///     fn kind(&self) -> &'static str {
///         "touch"
///     }
///
///     fn check(&self, _ctx: &StepContext<'_, ()>) -> CheckResult {
///         CheckResult::from_bool(self.path.exists(), "file missing")
///     }
///
///     fn apply(&self, _ctx: &StepContext<'_, ()>) -> anyhow::Result<()> {
///         std::fs::write(&self.path, b"")?;
///         Ok(())
///     }
/// }
/// ```
pub trait Step<H: ?Sized>: fmt::Debug {
    /// Unique identifier within a plan
    ///
    /// Stable across runs. Examples:
    /// - "package:os"
    /// - "dir:/srv/app"
    /// - "file:service-unit"
    fn id(&self) -> String;

    /// Human-readable description of what this step does
    fn description(&self) -> String;

    /// Step type category, used for grouping and target filtering
    fn kind(&self) -> &'static str;

    /// Whether a failure of this step should abort the plan
    fn criticality(&self) -> Criticality {
        Criticality::Structural
    }

    /// What an operator can do to undo a partial apply, if anything
    fn rollback_hint(&self) -> Option<String> {
        None
    }

    /// Ids of earlier steps whose change forces this step to run again
    ///
    /// A restart after a config file was rewritten is the typical case.
    fn watches(&self) -> Vec<String> {
        Vec::new()
    }

    /// Detectable readiness condition evaluated before `apply`
    fn precondition(&self, _ctx: &StepContext<'_, H>) -> Precondition {
        Precondition::Met
    }

    /// Inspect the host without changing it
    fn check(&self, ctx: &StepContext<'_, H>) -> CheckResult;

    /// Converge the host to the desired state
    ///
    /// Must be safe to call when already satisfied: re-running either does
    /// nothing or produces the same end state. Temporary resources acquired
    /// here are released on every exit path.
    fn apply(&self, ctx: &StepContext<'_, H>) -> Result<()>;
}

/// A boxed step for type-erased storage
pub type BoxedStep<H> = Box<dyn Step<H>>;
