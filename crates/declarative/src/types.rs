//! Core types for declarative step execution

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of inspecting the host for a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckResult {
    /// The host already matches the step's desired state
    Satisfied,
    /// The host does not match; `reason` says what differs
    NotSatisfied { reason: String },
    /// The check itself could not determine the state
    Unknown { reason: String },
}

impl CheckResult {
    pub fn not_satisfied(reason: impl Into<String>) -> Self {
        Self::NotSatisfied {
            reason: reason.into(),
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
        }
    }

    /// `Satisfied` when `ok`, otherwise `NotSatisfied` with `reason`
    pub fn from_bool(ok: bool, reason: impl Into<String>) -> Self {
        if ok {
            Self::Satisfied
        } else {
            Self::not_satisfied(reason)
        }
    }

    /// Check if the result means no work is needed
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Whether the host is ready for a step to be applied at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Met,
    /// Not ready yet; the step is skipped with a warning instead of failing
    Unmet { reason: String },
}

impl Precondition {
    pub fn unmet(reason: impl Into<String>) -> Self {
        Self::Unmet {
            reason: reason.into(),
        }
    }
}

/// How much the rest of the plan depends on a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Later steps build on this one; a failure aborts the plan
    Structural,
    /// A failure is recorded and execution continues
    BestEffort,
}

impl Criticality {
    /// Failure policy applied when the caller does not override it
    pub fn default_policy(self) -> FailurePolicy {
        match self {
            Self::Structural => FailurePolicy::StopOnFirstFailure,
            Self::BestEffort => FailurePolicy::ContinueAndCollect,
        }
    }
}

/// What the executor does after a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    StopOnFirstFailure,
    ContinueAndCollect,
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Check only; never call `apply`
    pub dry_run: bool,
    /// Override the per-step policy derived from criticality
    pub policy: Option<FailurePolicy>,
    /// Whole-plan budget; checked before each step starts
    pub timeout: Option<Duration>,
    /// Verbose output
    pub verbose: bool,
}

impl ExecuteOptions {
    /// Policy for a step of the given criticality
    pub fn policy_for(&self, criticality: Criticality) -> FailurePolicy {
        self.policy.unwrap_or(criticality.default_policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_from_bool() {
        assert_eq!(CheckResult::from_bool(true, "missing"), CheckResult::Satisfied);
        assert_eq!(
            CheckResult::from_bool(false, "missing"),
            CheckResult::NotSatisfied {
                reason: "missing".to_string()
            }
        );
        assert!(!CheckResult::unknown("probe failed").is_satisfied());
    }

    #[test]
    fn test_default_policy_follows_criticality() {
        let opts = ExecuteOptions::default();
        assert_eq!(
            opts.policy_for(Criticality::Structural),
            FailurePolicy::StopOnFirstFailure
        );
        assert_eq!(
            opts.policy_for(Criticality::BestEffort),
            FailurePolicy::ContinueAndCollect
        );
    }

    #[test]
    fn test_policy_override_wins() {
        let opts = ExecuteOptions {
            policy: Some(FailurePolicy::ContinueAndCollect),
            ..Default::default()
        };
        assert_eq!(
            opts.policy_for(Criticality::Structural),
            FailurePolicy::ContinueAndCollect
        );
    }
}
