//! Execution report - one outcome per planned step

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a step was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The check found nothing to do
    AlreadySatisfied,
    /// The step would have been applied, but this is a dry run
    DryRun,
    /// A detectable precondition is not met yet (non-fatal)
    PreconditionUnmet(String),
    /// An earlier failure or the plan timeout stopped execution
    Aborted(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySatisfied => write!(f, "already satisfied"),
            Self::DryRun => write!(f, "dry run"),
            Self::PreconditionUnmet(reason) => write!(f, "{}", reason),
            Self::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Final status of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepStatus {
    Skipped(SkipReason),
    Applied,
    Failed,
}

impl StepStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Short label for tables
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "skipped",
            Self::Applied => "applied",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub id: String,
    pub kind: String,
    #[serde(flatten)]
    pub status: StepStatus,
    /// What the check found, or the error chain on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_hint: Option<String>,
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, status: StepStatus) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            status,
            message: None,
            rollback_hint: None,
            duration_ms: 0,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_rollback_hint(mut self, hint: Option<String>) -> Self {
        self.rollback_hint = hint;
        self
    }

    /// The skip reason, if the step was skipped
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.status {
            StepStatus::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Ordered outcomes of a plan run
///
/// Holds exactly one outcome per planned step, in plan order. Steps never
/// reached because of an abort are present as `Skipped(Aborted)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub outcomes: Vec<StepOutcome>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter()
    }

    /// Find the outcome for a step id
    pub fn get(&self, id: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }

    /// Status of a step id, if it was planned
    pub fn status_of(&self, id: &str) -> Option<&StepStatus> {
        self.get(id).map(|o| &o.status)
    }

    /// Ids of every failed step, in plan order
    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_failed())
            .map(|o| o.id.as_str())
            .collect()
    }

    /// Check if the run was successful (no failures)
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|o| o.status.is_failed())
    }

    /// Number of steps that changed the host
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_applied()).count()
    }

    /// Count outcomes by status
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for outcome in &self.outcomes {
            summary.add(&outcome.status);
        }
        summary
    }
}

/// Summary of a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub applied: usize,
    pub satisfied: usize,
    pub dry_run: usize,
    pub precondition_unmet: usize,
    pub aborted: usize,
    pub failed: usize,
}

impl ReportSummary {
    /// Add a status to the summary
    pub fn add(&mut self, status: &StepStatus) {
        match status {
            StepStatus::Applied => self.applied += 1,
            StepStatus::Failed => self.failed += 1,
            StepStatus::Skipped(SkipReason::AlreadySatisfied) => self.satisfied += 1,
            StepStatus::Skipped(SkipReason::DryRun) => self.dry_run += 1,
            StepStatus::Skipped(SkipReason::PreconditionUnmet(_)) => self.precondition_unmet += 1,
            StepStatus::Skipped(SkipReason::Aborted(_)) => self.aborted += 1,
        }
    }

    /// Total number of steps
    pub fn total(&self) -> usize {
        self.applied
            + self.satisfied
            + self.dry_run
            + self.precondition_unmet
            + self.aborted
            + self.failed
    }

    /// Total number of skipped steps, whatever the reason
    pub fn skipped(&self) -> usize {
        self.satisfied + self.dry_run + self.precondition_unmet + self.aborted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
