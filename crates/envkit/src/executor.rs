//! Execution engine - runs a reconcile plan step by step
//!
//! Steps run sequentially and the first failure aborts the run. Nothing that
//! already ran is rolled back, and nothing is retried.

use crate::context::{Deployer, ProgressCallback, SnapshotStore};
use crate::error::Result;
use crate::planner::{PlannedStep, Precondition, ReconcilePlan};
use crate::types::{Action, ReconcileOptions, ReconcileSummary, StepResult};

/// Outcome of a reconcile run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub summary: ReconcileSummary,
    /// Actions that were not executed, with the reason
    pub skipped: Vec<(Action, String)>,
    /// Whether the new snapshot reached the store
    pub persisted: bool,
    /// Why persisting failed, if it did
    pub persist_error: Option<String>,
    pub dry_run: bool,
}

/// Run a plan against a deployer and persist the resulting snapshot
///
/// # Errors
/// Returns the first deployer error; steps after it are not attempted and the
/// snapshot is not written. A failure to persist the snapshot is reported in
/// the returned [`ReconcileReport`] instead.
pub fn reconcile<D, S, P>(
    plan: &ReconcilePlan,
    deployer: &D,
    store: &S,
    progress: &mut P,
    opts: &ReconcileOptions,
) -> Result<ReconcileReport>
where
    D: Deployer + ?Sized,
    S: SnapshotStore + ?Sized,
    P: ProgressCallback + ?Sized,
{
    let mut report = ReconcileReport {
        skipped: plan.skipped.clone(),
        dry_run: opts.dry_run,
        ..Default::default()
    };
    for (_, reason) in &plan.skipped {
        report.summary.add_result(&StepResult::Skipped {
            reason: reason.clone(),
        });
    }

    if opts.dry_run {
        log::info!(
            "dry run: {} step(s) planned for '{}'",
            plan.len(),
            plan.environment
        );
        return Ok(report);
    }

    let total = plan.len();
    for (index, step) in plan.steps.iter().enumerate() {
        progress.on_step_start(index + 1, total, step);
        log::debug!("[{}/{}] {}", index + 1, total, step.describe());

        match run_step(step, deployer) {
            Ok(result) => {
                report.summary.add_result(&result);
                progress.on_step_complete(step, &result);
            }
            Err(e) => {
                log::error!("{} aborted: {}", plan.environment, e);
                progress.on_step_failed(step, &e);
                return Err(e);
            }
        }
    }

    match store.write(&plan.environment, &plan.snapshot) {
        Ok(()) => report.persisted = true,
        Err(e) => {
            log::warn!("reconciled '{}' but could not save it: {}", plan.environment, e);
            report.persist_error = Some(e.to_string());
        }
    }

    Ok(report)
}

fn run_step<D: Deployer + ?Sized>(step: &PlannedStep, deployer: &D) -> Result<StepResult> {
    match step {
        PlannedStep::Ensure(Precondition::Credentials) => {
            deployer.ensure_credentials()?;
            Ok(StepResult::Ensured)
        }
        PlannedStep::Ensure(Precondition::Ingress) => {
            if deployer.has_ingress()? {
                log::debug!("ingress already present");
                return Ok(StepResult::AlreadyPresent);
            }
            deployer.install_ingress()?;
            Ok(StepResult::Ensured)
        }
        PlannedStep::Apply {
            action: Action::Install { .. },
            unit,
        } => {
            deployer.install_unit(unit)?;
            Ok(StepResult::Installed)
        }
        PlannedStep::Apply {
            action: Action::Uninstall { .. },
            unit,
        } => {
            deployer.uninstall_unit(unit)?;
            Ok(StepResult::Uninstalled)
        }
    }
}
