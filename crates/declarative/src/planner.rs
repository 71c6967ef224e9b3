//! Execution plan - an ordered list of steps

use crate::step::{BoxedStep, Step};
use std::fmt;

/// An ordered sequence of steps
///
/// Order is the execution order. It is resolved once when the plan is
/// built and never changes while the plan runs.
pub struct Plan<H: ?Sized> {
    steps: Vec<BoxedStep<H>>,
}

impl<H: ?Sized> Plan<H> {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step
    pub fn push(&mut self, step: BoxedStep<H>) {
        self.steps.push(step);
    }

    /// Iterate over steps in execution order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Step<H>> {
        self.steps.iter().map(|s| s.as_ref())
    }

    /// Step ids in execution order
    pub fn ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    /// Position of a step id in the plan
    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id() == id)
    }

    /// Total number of steps in the plan
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Filter plan to only include steps matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Step<H>) -> bool,
    {
        Self {
            steps: self
                .steps
                .into_iter()
                .filter(|s| predicate(s.as_ref()))
                .collect(),
        }
    }

    /// Filter plan to only include steps matching a target pattern
    ///
    /// Target format: "kind" or "kind.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, name) = parse_target(t);
                self.filter(|s| matches_filter(s, kind.as_deref(), name.as_deref()))
            }
        }
    }
}

impl<H: ?Sized> Default for Plan<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> fmt::Debug for Plan<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan").field("steps", &self.ids()).finish()
    }
}

/// Parse a target string like "kind.name" into (kind, name)
///
/// Only the first dot separates the kind, so "cert.example.test" targets
/// the certificate step for `example.test`.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((kind, name)) if !kind.is_empty() && !name.is_empty() => {
            (Some(kind.to_string()), Some(name.to_string()))
        }
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a step matches the filter criteria
fn matches_filter<H: ?Sized>(step: &dyn Step<H>, kind: Option<&str>, name: Option<&str>) -> bool {
    if let Some(k) = kind {
        // Allow common aliases
        let matches_kind = match k {
            "packages" => step.kind() == "package",
            "files" => step.kind() == "file",
            "services" => step.kind() == "service",
            _ => step.kind() == k || step.kind().starts_with(k),
        };
        if !matches_kind {
            return false;
        }
    }

    if let Some(n) = name
        && !step.id().contains(n)
    {
        return false;
    }

    true
}
