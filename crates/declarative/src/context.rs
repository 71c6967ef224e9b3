//! Step context and progress callbacks
//!
//! These let the declarative crate run without depending on a specific
//! host implementation or terminal UI.

use crate::report::{Report, StepOutcome};
use std::collections::HashSet;

/// Progress callback for plan execution
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called once before the first step
    fn on_plan_start(&mut self, total: usize, dry_run: bool);

    /// Called when a step is about to be checked
    fn on_step_start(&mut self, index: usize, total: usize, id: &str, description: &str);

    /// Called with the final outcome of every step, including aborted ones
    fn on_step_complete(&mut self, outcome: &StepOutcome);

    /// Called once after the last step
    fn on_plan_complete(&mut self, report: &Report);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_plan_start(&mut self, _total: usize, _dry_run: bool) {}
    fn on_step_start(&mut self, _index: usize, _total: usize, _id: &str, _description: &str) {}
    fn on_step_complete(&mut self, _outcome: &StepOutcome) {}
    fn on_plan_complete(&mut self, _report: &Report) {}
}

/// Context passed to step check/apply operations
pub struct StepContext<'a, H: ?Sized> {
    /// Host capabilities the step acts through
    pub host: &'a H,
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
    changed: &'a HashSet<String>,
}

impl<'a, H: ?Sized> StepContext<'a, H> {
    /// Create a new step context
    pub fn new(host: &'a H, changed: &'a HashSet<String>, dry_run: bool, verbose: bool) -> Self {
        Self {
            host,
            dry_run,
            verbose,
            changed,
        }
    }

    /// Whether the step with `id` was applied earlier in this run
    pub fn changed(&self, id: &str) -> bool {
        self.changed.contains(id)
    }

    /// Ids from `ids` that were applied earlier in this run
    pub fn changed_among(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter(|id| self.changed.contains(id.as_str()))
            .cloned()
            .collect()
    }
}
