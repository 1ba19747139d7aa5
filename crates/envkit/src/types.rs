//! Core types for environment reconciliation

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::process::Output;

/// Kind of an installable catalog unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Third-party infrastructure (database, broker, ...)
    Infra,
    /// Internally built service
    Service,
}

impl Kind {
    /// Key used for this kind in selections and snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Infra => "infra",
            Self::Service => "services",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired set of infrastructure and services for an environment
///
/// Sets are ordered so that plans, prompts and snapshots come out in a
/// stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub infra: BTreeSet<String>,
    #[serde(default)]
    pub services: BTreeSet<String>,
}

impl Selection {
    /// Build a selection from two lists of identifiers
    pub fn new<I, S, J, T>(infra: I, services: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            infra: infra.into_iter().map(Into::into).collect(),
            services: services.into_iter().map(Into::into).collect(),
        }
    }

    /// Identifiers selected for the given kind
    pub fn set(&self, kind: Kind) -> &BTreeSet<String> {
        match kind {
            Kind::Infra => &self.infra,
            Kind::Service => &self.services,
        }
    }

    /// Check whether an identifier of the given kind is selected
    pub fn contains(&self, kind: Kind, id: &str) -> bool {
        self.set(kind).contains(id)
    }

    /// Check whether every identifier of `other` is also selected here
    pub fn is_superset_of(&self, other: &Selection) -> bool {
        self.infra.is_superset(&other.infra) && self.services.is_superset(&other.services)
    }

    /// Total number of selected identifiers
    pub fn len(&self) -> usize {
        self.infra.len() + self.services.len()
    }

    /// Check if nothing is selected
    pub fn is_empty(&self) -> bool {
        self.infra.is_empty() && self.services.is_empty()
    }
}

/// A logical reconciliation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Install { kind: Kind, id: String },
    Uninstall { kind: Kind, id: String },
}

impl Action {
    pub fn install(kind: Kind, id: impl Into<String>) -> Self {
        Self::Install {
            kind,
            id: id.into(),
        }
    }

    pub fn uninstall(kind: Kind, id: impl Into<String>) -> Self {
        Self::Uninstall {
            kind,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Install { kind, .. } | Self::Uninstall { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Install { id, .. } | Self::Uninstall { id, .. } => id,
        }
    }

    pub fn is_install(&self) -> bool {
        matches!(self, Self::Install { .. })
    }

    pub fn is_uninstall(&self) -> bool {
        matches!(self, Self::Uninstall { .. })
    }

    /// Verb shown to the user ("install" / "uninstall")
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install",
            Self::Uninstall { .. } => "uninstall",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.verb(), self.id())
    }
}

/// Everything the deployment tool needs to install or remove one unit
///
/// A unit is a git source plus a deployable that references the source by
/// name (`<name>-repo`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub kind: Kind,
    /// Catalog identifier
    pub id: String,
    /// Human-readable name from the catalog
    pub display_name: String,
    /// Name of the deployable
    pub name: String,
    pub repository: String,
    pub branch: Option<String>,
    pub ref_name: Option<String>,
    /// Path inside the repository holding the manifests
    pub path: Option<String>,
    pub namespace: String,
}

impl UnitSpec {
    /// Name of the git source the deployable points at
    pub fn source_name(&self) -> String {
        format!("{}-repo", self.name)
    }

    /// Label used in progress output, e.g. "PostgreSQL (postgresql)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.display_name, self.id)
    }
}

/// Result of a single reconciliation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    /// Unit was installed (or re-applied)
    Installed,
    /// Unit was removed
    Uninstalled,
    /// Precondition was already satisfied
    AlreadyPresent,
    /// Precondition was established
    Ensured,
    /// Step was not executed
    Skipped { reason: String },
}

/// Summary of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub installed: usize,
    pub uninstalled: usize,
    pub ensured: usize,
    pub skipped: usize,
}

impl ReconcileSummary {
    /// Number of install/uninstall steps executed
    pub fn total_changes(&self) -> usize {
        self.installed + self.uninstalled
    }

    /// Add a step result to the summary
    pub fn add_result(&mut self, result: &StepResult) {
        match result {
            StepResult::Installed => self.installed += 1,
            StepResult::Uninstalled => self.uninstalled += 1,
            StepResult::Ensured | StepResult::AlreadyPresent => self.ensured += 1,
            StepResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for reconciliation
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Don't call the deployer or persist anything, just report the plan
    pub dry_run: bool,
}

/// Output from an external command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
