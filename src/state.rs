use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use envkit::{Event, Phase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

// ============================================================================
// State Structures
// ============================================================================

/// Lifecycle records of every environment pulse8 has managed
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EnvironmentState {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentRecord>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// Lifecycle record of a single environment
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EnvironmentRecord {
    pub phase: Phase,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Error of the last failed reconcile, cleared by the next success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl EnvironmentRecord {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            phase: Phase::Absent,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }
}

// ============================================================================
// EnvironmentState Implementation
// ============================================================================

impl EnvironmentState {
    /// Get the state file path
    pub fn state_file() -> Result<PathBuf> {
        Ok(paths::state_dir()?.join("environments.toml"))
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: EnvironmentState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            paths::ensure_dir(dir)?;
        }

        self.last_updated = Utc::now();
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&EnvironmentRecord> {
        self.environments.get(id)
    }

    /// Current phase, `Absent` for unknown environments
    pub fn phase(&self, id: &str) -> Phase {
        self.get(id).map(|record| record.phase).unwrap_or_default()
    }

    /// Apply a lifecycle event to an environment
    ///
    /// Creating an environment that was deleted earlier starts a fresh record.
    pub fn apply(&mut self, id: &str, event: Event) -> Result<Phase> {
        if event == Event::Create && self.phase(id) == Phase::Deleted {
            self.environments.remove(id);
        }

        let record = self
            .environments
            .entry(id.to_string())
            .or_insert_with(EnvironmentRecord::new);
        let next = record
            .phase
            .transition(event)
            .with_context(|| format!("Environment '{id}'"))?;

        record.phase = next;
        record.updated_at = Utc::now();
        if event == Event::Reconcile {
            record.last_error = None;
        }
        Ok(next)
    }

    /// Record a failed reconcile without changing the phase
    pub fn record_failure(&mut self, id: &str, error: &str) {
        let record = self
            .environments
            .entry(id.to_string())
            .or_insert_with(EnvironmentRecord::new);
        record.last_error = Some(error.to_string());
        record.updated_at = Utc::now();
    }

    /// Make sure an environment created elsewhere has a record
    ///
    /// Clusters created on another machine or by an older version of the
    /// tool are adopted as `Configured`.
    pub fn adopt(&mut self, id: &str) {
        let record = self
            .environments
            .entry(id.to_string())
            .or_insert_with(EnvironmentRecord::new);
        if matches!(record.phase, Phase::Absent | Phase::Deleted) {
            log::debug!("adopting environment '{}' as configured", id);
            record.phase = Phase::Configured;
            record.updated_at = Utc::now();
        }
    }
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self {
            environments: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
