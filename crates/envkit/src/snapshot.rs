//! Persisted desired state of an environment

use crate::catalog::Catalog;
use crate::types::{Kind, Selection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-service record stored in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub repository: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, rename = "ref-name")]
    pub ref_name: Option<String>,
    /// True when the service is not part of the selection
    #[serde(default)]
    pub suspend: bool,
}

/// Selection of an environment plus the state of every known service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Environment identifier
    pub name: String,
    #[serde(default)]
    pub infra: Vec<String>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceRecord>,
}

impl Snapshot {
    /// Record a (resolved) selection
    ///
    /// Every catalog service gets a record; the ones outside the selection
    /// are marked suspended. Selected services the catalog does not know are
    /// left out.
    pub fn record(name: &str, selection: &Selection, catalog: &Catalog) -> Self {
        let services = catalog
            .entries(Kind::Service)
            .iter()
            .map(|(id, entry)| {
                let record = ServiceRecord {
                    name: entry.name.clone(),
                    repository: entry.repository.clone(),
                    branch: entry.branch.clone(),
                    ref_name: entry.ref_name.clone(),
                    suspend: !selection.services.contains(id),
                };
                (id.clone(), record)
            })
            .collect();

        Self {
            name: name.to_string(),
            infra: selection.infra.iter().cloned().collect(),
            services,
        }
    }

    /// Selection this snapshot describes (non-suspended services only)
    pub fn selection(&self) -> Selection {
        Selection::new(
            self.infra.iter().cloned(),
            self.active_services().map(str::to_string),
        )
    }

    /// Services that were running when the snapshot was taken
    pub fn active_services(&self) -> impl Iterator<Item = &str> {
        self.services
            .iter()
            .filter(|(_, record)| !record.suspend)
            .map(|(id, _)| id.as_str())
    }

    /// Services recorded as suspended
    pub fn suspended_services(&self) -> impl Iterator<Item = &str> {
        self.services
            .iter()
            .filter(|(_, record)| record.suspend)
            .map(|(id, _)| id.as_str())
    }

    pub fn is_suspended(&self, service: &str) -> Option<bool> {
        self.services.get(service).map(|record| record.suspend)
    }
}
