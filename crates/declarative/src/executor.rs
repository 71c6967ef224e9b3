//! Execution engine - runs a plan strictly in order and records every outcome

use crate::context::{ProgressCallback, StepContext};
use crate::planner::Plan;
use crate::report::{Report, SkipReason, StepOutcome, StepStatus};
use crate::step::Step;
use crate::types::{CheckResult, ExecuteOptions, FailurePolicy, Precondition};
use std::collections::HashSet;
use std::time::Instant;

/// Execute a plan against a host
///
/// Steps run sequentially: later steps depend on what earlier ones leave
/// on the host. For each step the executor checks current state, applies
/// when needed, and records the outcome. When a step fails under
/// `StopOnFirstFailure`, or the plan timeout expires before a step starts,
/// every remaining step is recorded as `Skipped(Aborted)`. The returned
/// report always has one outcome per planned step.
///
/// # Arguments
/// * `plan` - The steps to run, in order
/// * `host` - Host capabilities handed to every step
/// * `opts` - Dry run, failure policy override, timeout
/// * `progress` - Progress callback
pub fn execute<H, P>(plan: &Plan<H>, host: &H, opts: &ExecuteOptions, progress: &mut P) -> Report
where
    H: ?Sized,
    P: ProgressCallback,
{
    let started = Instant::now();
    let total = plan.len();
    let mut report = Report::with_capacity(total);
    let mut changed: HashSet<String> = HashSet::new();
    let mut abort: Option<String> = None;

    progress.on_plan_start(total, opts.dry_run);

    for (index, step) in plan.iter().enumerate() {
        if abort.is_none()
            && let Some(timeout) = opts.timeout
            && started.elapsed() >= timeout
        {
            log::warn!(
                "Plan timeout of {}s reached before {}",
                timeout.as_secs(),
                step.id()
            );
            abort = Some(format!("plan timeout of {}s reached", timeout.as_secs()));
        }

        if let Some(reason) = &abort {
            let outcome = StepOutcome::new(
                step.id(),
                step.kind(),
                StepStatus::Skipped(SkipReason::Aborted(reason.clone())),
            );
            progress.on_step_complete(&outcome);
            report.push(outcome);
            continue;
        }

        let id = step.id();
        progress.on_step_start(index, total, &id, &step.description());

        let step_started = Instant::now();
        let mut outcome = run_step(step, host, &changed, opts);
        outcome.duration_ms = u64::try_from(step_started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &outcome.status {
            StepStatus::Applied | StepStatus::Skipped(SkipReason::DryRun) => {
                changed.insert(id.clone());
            }
            StepStatus::Failed => {
                if opts.policy_for(step.criticality()) == FailurePolicy::StopOnFirstFailure {
                    log::error!("{} failed; aborting remaining steps", id);
                    abort = Some(format!("{} failed", id));
                } else {
                    log::warn!("{} failed; continuing", id);
                }
            }
            StepStatus::Skipped(_) => {}
        }

        progress.on_step_complete(&outcome);
        report.push(outcome);
    }

    progress.on_plan_complete(&report);
    report
}

/// Check, and if needed apply, a single step
fn run_step<H: ?Sized>(
    step: &dyn Step<H>,
    host: &H,
    changed: &HashSet<String>,
    opts: &ExecuteOptions,
) -> StepOutcome {
    let id = step.id();
    let ctx = StepContext::new(host, changed, opts.dry_run, opts.verbose);
    let skipped = |reason: SkipReason| StepOutcome::new(&id, step.kind(), StepStatus::Skipped(reason));

    let triggered = ctx.changed_among(&step.watches());
    let reason = match step.check(&ctx) {
        CheckResult::Satisfied if triggered.is_empty() => {
            log::debug!("{}: already satisfied", id);
            return skipped(SkipReason::AlreadySatisfied);
        }
        CheckResult::Satisfied => format!("changed: {}", triggered.join(", ")),
        CheckResult::NotSatisfied { reason } => {
            log::debug!("{}: not satisfied ({})", id, reason);
            reason
        }
        CheckResult::Unknown { reason } => {
            log::warn!("{}: state unknown ({}); treating as not satisfied", id, reason);
            format!("state unknown: {}", reason)
        }
    };

    if let Precondition::Unmet { reason } = step.precondition(&ctx) {
        log::warn!("{}: skipped, {}", id, reason);
        return skipped(SkipReason::PreconditionUnmet(reason));
    }

    if opts.dry_run {
        return skipped(SkipReason::DryRun).with_message(reason);
    }

    log::info!("{}: applying ({})", id, reason);
    match step.apply(&ctx) {
        Ok(()) => StepOutcome::new(&id, step.kind(), StepStatus::Applied).with_message(reason),
        Err(e) => {
            log::error!("{}: {:#}", id, e);
            StepOutcome::new(&id, step.kind(), StepStatus::Failed)
                .with_message(format!("{:#}", e))
                .with_rollback_hint(step.rollback_hint())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::types::Criticality;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    /// In-memory host: a set of "present" markers plus an apply log
    #[derive(Default)]
    struct FakeHost {
        present: RefCell<HashSet<String>>,
        applied: RefCell<Vec<String>>,
        broken: HashSet<String>,
        unready: HashMap<String, String>,
    }

    #[derive(Debug)]
    struct Marker {
        name: &'static str,
        criticality: Criticality,
        watches: Vec<String>,
        unknown: bool,
    }

    impl Marker {
        fn structural(name: &'static str) -> Self {
            Self {
                name,
                criticality: Criticality::Structural,
                watches: Vec::new(),
                unknown: false,
            }
        }

        fn best_effort(name: &'static str) -> Self {
            Self {
                criticality: Criticality::BestEffort,
                ..Self::structural(name)
            }
        }
    }

    impl Step<FakeHost> for Marker {
        fn id(&self) -> String {
            self.name.to_string()
        }

        fn description(&self) -> String {
            format!("Ensure marker {}", self.name)
        }

        fn kind(&self) -> &'static str {
            "marker"
        }

        fn criticality(&self) -> Criticality {
            self.criticality
        }

        fn rollback_hint(&self) -> Option<String> {
            Some(format!("remove marker {}", self.name))
        }

        fn watches(&self) -> Vec<String> {
            self.watches.clone()
        }

        fn precondition(&self, ctx: &StepContext<'_, FakeHost>) -> Precondition {
            match ctx.host.unready.get(self.name) {
                Some(reason) => Precondition::unmet(reason.clone()),
                None => Precondition::Met,
            }
        }

        fn check(&self, ctx: &StepContext<'_, FakeHost>) -> CheckResult {
            if self.unknown {
                return CheckResult::unknown("probe exited 2");
            }
            CheckResult::from_bool(
                ctx.host.present.borrow().contains(self.name),
                "marker missing",
            )
        }

        fn apply(&self, ctx: &StepContext<'_, FakeHost>) -> anyhow::Result<()> {
            ctx.host.applied.borrow_mut().push(self.name.to_string());
            if ctx.host.broken.contains(self.name) {
                bail!("tool exited with status 100");
            }
            ctx.host.present.borrow_mut().insert(self.name.to_string());
            Ok(())
        }
    }

    fn plan_of(steps: Vec<Marker>) -> Plan<FakeHost> {
        let mut plan = Plan::new();
        for step in steps {
            plan.push(Box::new(step));
        }
        plan
    }

    fn statuses(report: &Report) -> Vec<StepStatus> {
        report.iter().map(|o| o.status.clone()).collect()
    }

    #[test]
    fn test_execute_empty_plan() {
        let report = execute(
            &Plan::<FakeHost>::new(),
            &FakeHost::default(),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );
        assert!(report.is_empty());
        assert!(report.is_success());
    }

    #[test]
    fn test_satisfied_steps_are_skipped() {
        let host = FakeHost::default();
        host.present.borrow_mut().insert("a".to_string());
        let plan = plan_of(vec![Marker::structural("a"), Marker::structural("b")]);

        let report = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);

        assert_eq!(
            statuses(&report),
            vec![
                StepStatus::Skipped(SkipReason::AlreadySatisfied),
                StepStatus::Applied
            ]
        );
        assert_eq!(*host.applied.borrow(), vec!["b".to_string()]);
    }

    #[test]
    fn test_second_run_applies_nothing() {
        let host = FakeHost::default();
        let plan = plan_of(vec![
            Marker::structural("a"),
            Marker::structural("b"),
            Marker::best_effort("c"),
        ]);

        let first = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);
        assert_eq!(first.applied_count(), 3);

        let second = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);
        assert_eq!(second.applied_count(), 0);
        assert!(
            second
                .iter()
                .all(|o| o.status == StepStatus::Skipped(SkipReason::AlreadySatisfied))
        );
    }

    #[test]
    fn test_structural_failure_aborts_remaining() {
        let host = FakeHost {
            broken: ["a".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let plan = plan_of(vec![
            Marker::structural("a"),
            Marker::structural("b"),
            Marker::best_effort("c"),
        ]);

        let report = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);

        assert_eq!(report.len(), 3);
        assert_eq!(report.failed_ids(), vec!["a"]);
        let failed = report.get("a").unwrap();
        assert_eq!(failed.message.as_deref(), Some("tool exited with status 100"));
        assert_eq!(failed.rollback_hint.as_deref(), Some("remove marker a"));
        for id in ["b", "c"] {
            assert_eq!(
                report.status_of(id),
                Some(&StepStatus::Skipped(SkipReason::Aborted("a failed".into())))
            );
        }
        assert_eq!(*host.applied.borrow(), vec!["a".to_string()]);
    }

    #[test]
    fn test_best_effort_failure_continues() {
        let host = FakeHost {
            broken: ["a".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let plan = plan_of(vec![Marker::best_effort("a"), Marker::structural("b")]);

        let report = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);

        assert_eq!(report.status_of("a"), Some(&StepStatus::Failed));
        assert_eq!(report.status_of("b"), Some(&StepStatus::Applied));
        assert!(!report.is_success());
    }

    #[test]
    fn test_policy_override_continues_after_structural_failure() {
        let host = FakeHost {
            broken: ["a".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let plan = plan_of(vec![Marker::structural("a"), Marker::structural("b")]);
        let opts = ExecuteOptions {
            policy: Some(FailurePolicy::ContinueAndCollect),
            ..Default::default()
        };

        let report = execute(&plan, &host, &opts, &mut NoProgress);

        assert_eq!(report.status_of("b"), Some(&StepStatus::Applied));
    }

    #[test]
    fn test_precondition_unmet_is_non_fatal() {
        let host = FakeHost {
            unready: [("a".to_string(), "DNS not ready".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let plan = plan_of(vec![Marker::best_effort("a"), Marker::structural("b")]);

        let report = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);

        assert_eq!(
            report.status_of("a"),
            Some(&StepStatus::Skipped(SkipReason::PreconditionUnmet(
                "DNS not ready".into()
            )))
        );
        assert_eq!(report.status_of("b"), Some(&StepStatus::Applied));
        assert!(report.is_success());
        assert!(host.applied.borrow().iter().all(|id| id != "a"));
    }

    #[test]
    fn test_unknown_check_is_applied() {
        let host = FakeHost::default();
        host.present.borrow_mut().insert("a".to_string());
        let plan = plan_of(vec![Marker {
            unknown: true,
            ..Marker::structural("a")
        }]);

        let report = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);

        let outcome = report.get("a").unwrap();
        assert_eq!(outcome.status, StepStatus::Applied);
        assert_eq!(outcome.message.as_deref(), Some("state unknown: probe exited 2"));
    }

    #[test]
    fn test_watched_change_triggers_satisfied_step() {
        let host = FakeHost::default();
        host.present.borrow_mut().insert("restart".to_string());
        let plan = plan_of(vec![
            Marker::structural("config"),
            Marker {
                watches: vec!["config".to_string()],
                ..Marker::structural("restart")
            },
        ]);

        let first = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);
        assert_eq!(first.status_of("restart"), Some(&StepStatus::Applied));
        assert_eq!(
            first.get("restart").unwrap().message.as_deref(),
            Some("changed: config")
        );

        let second = execute(&plan, &host, &ExecuteOptions::default(), &mut NoProgress);
        assert_eq!(second.applied_count(), 0);
    }

    #[test]
    fn test_dry_run_never_applies() {
        let host = FakeHost::default();
        let plan = plan_of(vec![Marker::structural("a"), Marker::structural("b")]);
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = execute(&plan, &host, &opts, &mut NoProgress);

        assert_eq!(report.summary().dry_run, 2);
        assert!(host.applied.borrow().is_empty());
        assert_eq!(
            report.get("a").unwrap().message.as_deref(),
            Some("marker missing")
        );
    }

    #[test]
    fn test_zero_timeout_aborts_before_first_step() {
        let host = FakeHost::default();
        let plan = plan_of(vec![Marker::structural("a"), Marker::structural("b")]);
        let opts = ExecuteOptions {
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };

        let report = execute(&plan, &host, &opts, &mut NoProgress);

        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|o| matches!(
            o.skip_reason(),
            Some(SkipReason::Aborted(reason)) if reason.contains("timeout")
        )));
        assert!(host.applied.borrow().is_empty());
    }
}
