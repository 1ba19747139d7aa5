//! Reconcile planner - turns a diff into concrete, ordered steps

use crate::catalog::Catalog;
use crate::diff::{DiffSummary, compute_actions};
use crate::snapshot::Snapshot;
use crate::types::{Action, Selection, UnitSpec};
use std::fmt;

/// Cluster-wide prerequisite ensured before any unit is touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Git credential used by every source
    Credentials,
    /// Ingress controller and local TLS certificate
    Ingress,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credentials => f.write_str("git credentials"),
            Self::Ingress => f.write_str("ingress"),
        }
    }
}

/// One step of a reconcile run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedStep {
    Ensure(Precondition),
    Apply { action: Action, unit: UnitSpec },
}

impl PlannedStep {
    /// Short description for progress output
    pub fn describe(&self) -> String {
        match self {
            Self::Ensure(precondition) => format!("ensure {precondition}"),
            Self::Apply { action, unit } => format!("{} {}", action.verb(), unit.label()),
        }
    }

    /// What the step works on, without the verb
    pub fn target(&self) -> String {
        match self {
            Self::Ensure(precondition) => precondition.to_string(),
            Self::Apply { unit, .. } => unit.label(),
        }
    }

    pub fn action(&self) -> Option<&Action> {
        match self {
            Self::Ensure(_) => None,
            Self::Apply { action, .. } => Some(action),
        }
    }
}

/// A fully resolved reconcile run for one environment
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    /// Environment identifier
    pub environment: String,
    /// Steps in execution order, preconditions first
    pub steps: Vec<PlannedStep>,
    /// Actions dropped because the catalog does not know the identifier
    pub skipped: Vec<(Action, String)>,
    /// Snapshot to persist once every step succeeded
    pub snapshot: Snapshot,
}

impl ReconcilePlan {
    /// Plan the move from `old` to the resolved `selection`
    pub fn build(
        environment: &str,
        old: Option<&Snapshot>,
        selection: &Selection,
        catalog: &Catalog,
    ) -> Self {
        let mut steps = vec![
            PlannedStep::Ensure(Precondition::Credentials),
            PlannedStep::Ensure(Precondition::Ingress),
        ];
        let mut skipped = Vec::new();

        for action in compute_actions(old, selection) {
            match catalog.unit_spec(action.kind(), action.id()) {
                Some(unit) => steps.push(PlannedStep::Apply { action, unit }),
                None => {
                    log::warn!(
                        "skipping {}: '{}' is not in the {} catalog",
                        action,
                        action.id(),
                        action.kind()
                    );
                    let reason = format!("unknown {} identifier", action.kind());
                    skipped.push((action, reason));
                }
            }
        }

        Self {
            environment: environment.to_string(),
            steps,
            skipped,
            snapshot: Snapshot::record(environment, selection, catalog),
        }
    }

    /// Install/uninstall actions that will run, in order
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.steps.iter().filter_map(PlannedStep::action)
    }

    pub fn summary(&self) -> DiffSummary {
        let actions: Vec<Action> = self.actions().cloned().collect();
        DiffSummary::from_actions(&actions)
    }

    /// Number of steps, preconditions included
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
