//! Provider traits for reconciliation
//!
//! These traits keep envkit free of any particular deployment tool or
//! storage backend. The CLI implements them on top of flux, kubectl and the
//! local filesystem; tests implement them with recording fakes.

use crate::error::{Error, Result};
use crate::planner::PlannedStep;
use crate::snapshot::Snapshot;
use crate::types::{StepResult, UnitSpec};

/// Declarative deployment capability
///
/// Every call is expected to be idempotent at the tool level and to report
/// failure through `Err`, carrying the tool's output verbatim.
pub trait Deployer {
    /// Make sure the cluster-wide git credential exists
    fn ensure_credentials(&self) -> Result<()>;

    /// Probe whether the ingress/TLS layer is installed
    fn has_ingress(&self) -> Result<bool>;

    /// Install the ingress/TLS layer
    fn install_ingress(&self) -> Result<()>;

    /// Register the unit's source, then the deployable referencing it
    fn install_unit(&self, unit: &UnitSpec) -> Result<()>;

    /// Deregister the unit's source and deployable
    fn uninstall_unit(&self, unit: &UnitSpec) -> Result<()>;
}

/// Storage for environment snapshots
pub trait SnapshotStore {
    /// Read a snapshot, `None` if the environment has none
    fn read(&self, id: &str) -> Result<Option<Snapshot>>;

    /// Replace the snapshot of an environment
    fn write(&self, id: &str, snapshot: &Snapshot) -> Result<()>;

    /// Remove the snapshot of an environment (missing is not an error)
    fn delete(&self, id: &str) -> Result<()>;
}

/// Progress callback for reconciliation
pub trait ProgressCallback {
    /// Called before a step runs
    fn on_step_start(&mut self, index: usize, total: usize, step: &PlannedStep);

    /// Called after a step succeeded
    fn on_step_complete(&mut self, step: &PlannedStep, result: &StepResult);

    /// Called when a step failed and the run is about to abort
    fn on_step_failed(&mut self, step: &PlannedStep, error: &Error);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_step_start(&mut self, _index: usize, _total: usize, _step: &PlannedStep) {}
    fn on_step_complete(&mut self, _step: &PlannedStep, _result: &StepResult) {}
    fn on_step_failed(&mut self, _step: &PlannedStep, _error: &Error) {}
}
