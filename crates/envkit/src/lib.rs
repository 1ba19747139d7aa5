//! # envkit
//!
//! Dependency resolution and desired-state reconciliation for local
//! development environments.
//!
//! This crate holds the pure core of `pulse8 env`: given a user's selection
//! of infrastructure and services, close it under the catalog's dependency
//! tables, diff it against the previous snapshot of the environment, and
//! drive an external deployment tool through the resulting install and
//! uninstall steps.
//!
//! ## Core Concepts
//!
//! - **Catalog**: static definitions of installable units (infra and services)
//!   and the dependency tables derived from them
//! - **Selection**: the desired `infra` and `services` identifier sets
//! - **Snapshot**: a persisted selection plus per-service suspension flags
//! - **ReconcilePlan**: preconditions and ordered install/uninstall steps
//! - **Executor**: runs a plan fail-fast and persists the new snapshot
//!
//! ## Example
//!
//! ```ignore
//! use envkit::{
//!     Catalog, ReconcileOptions, ReconcilePlan, Selection, NoProgress,
//!     reconcile, resolve,
//! };
//!
//! let catalog: Catalog = toml::from_str(CATALOG_TOML)?;
//! let tables = catalog.dependency_tables();
//!
//! let mut selection = Selection::new(["redis"], ["pulse8-core-iam"]);
//! resolve(&mut selection, &tables);
//!
//! let old = store.read("dev")?;
//! let plan = ReconcilePlan::build("dev", old.as_ref(), &selection, &catalog);
//! let opts = ReconcileOptions::default();
//! let report = reconcile(&plan, &deployer, &store, &mut NoProgress, &opts)?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate never shells out itself. Side effects go through traits:
//!
//! - [`Deployer`]: installs and uninstalls units, ensures cluster preconditions
//! - [`SnapshotStore`]: reads, writes and deletes snapshots
//! - [`ProgressCallback`]: receives step notifications
//!
//! The `pulse8` binary implements them on top of `flux`, `kubectl` and the
//! local filesystem; the tests implement them with in-memory recorders.

pub mod catalog;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod planner;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-export main types at crate root
pub use catalog::{Catalog, CatalogEntry, DependencyTables, UnitSettings};
pub use context::{Deployer, NoProgress, ProgressCallback, SnapshotStore};
pub use diff::{DiffSummary, compute_actions};
pub use error::{Error, Result};
pub use executor::{ReconcileReport, reconcile};
pub use lifecycle::{Event, Phase};
pub use planner::{PlannedStep, Precondition, ReconcilePlan};
pub use resolver::{resolve, resolved};
pub use snapshot::{ServiceRecord, Snapshot};
pub use store::{MemoryStore, MirroredStore};
pub use types::{
    Action, CommandOutput, Kind, ReconcileOptions, ReconcileSummary, Selection, StepResult,
    UnitSpec,
};
