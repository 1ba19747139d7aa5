//! Static catalog of installable units and their dependency tables
//!
//! The catalog is plain data, loaded once at startup (the binary ships a
//! built-in TOML document). Dependencies are declared per entry and folded
//! into three immutable tables: `infra -> [infra]`, `service -> [infra]` and
//! `service -> [service]`.

use crate::error::{Error, Result};
use crate::snapshot::ServiceRecord;
use crate::types::{Kind, Selection, UnitSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One installable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name
    pub name: String,
    /// Git repository holding the unit's manifests
    pub repository: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub ref_name: Option<String>,
    /// Deployable name override (defaults depend on kind, see [`UnitSettings`])
    #[serde(default)]
    pub unit: Option<String>,
    /// Manifest path inside the repository
    #[serde(default)]
    pub path: Option<String>,
    /// Target namespace override
    #[serde(default)]
    pub namespace: Option<String>,
    /// Whether the unit runs on arm64 hosts
    #[serde(default = "default_true")]
    pub arm64: bool,
    #[serde(default)]
    pub requires_infra: Vec<String>,
    #[serde(default)]
    pub requires_services: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Naming rules shared by all units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSettings {
    /// Prefix for infra deployables, e.g. `pulse8-core-env-` + `kafka`
    #[serde(default = "default_infra_prefix")]
    pub infra_prefix: String,
    /// Default target namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_infra_prefix() -> String {
    "pulse8-core-env-".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self {
            infra_prefix: default_infra_prefix(),
            namespace: default_namespace(),
        }
    }
}

/// The full catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub units: UnitSettings,
    /// Preselection offered when nothing else is known
    #[serde(default)]
    pub defaults: Selection,
    #[serde(default)]
    pub infra: BTreeMap<String, CatalogEntry>,
    #[serde(default)]
    pub services: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// All entries of one kind
    pub fn entries(&self, kind: Kind) -> &BTreeMap<String, CatalogEntry> {
        match kind {
            Kind::Infra => &self.infra,
            Kind::Service => &self.services,
        }
    }

    pub fn get(&self, kind: Kind, id: &str) -> Option<&CatalogEntry> {
        self.entries(kind).get(id)
    }

    pub fn contains(&self, kind: Kind, id: &str) -> bool {
        self.entries(kind).contains_key(id)
    }

    /// Entries that can be offered on the current host
    pub fn selectable(&self, kind: Kind, arm64_host: bool) -> Vec<(&str, &CatalogEntry)> {
        self.entries(kind)
            .iter()
            .filter(|(_, entry)| entry.arm64 || !arm64_host)
            .map(|(id, entry)| (id.as_str(), entry))
            .collect()
    }

    /// Identifiers of a selection the catalog does not know
    pub fn unknown(&self, selection: &Selection) -> Vec<(Kind, String)> {
        let mut unknown = Vec::new();
        for kind in [Kind::Infra, Kind::Service] {
            for id in selection.set(kind) {
                if !self.contains(kind, id) {
                    unknown.push((kind, id.clone()));
                }
            }
        }
        unknown
    }

    /// Fold the per-entry dependency lists into lookup tables
    pub fn dependency_tables(&self) -> DependencyTables {
        let mut tables = DependencyTables::default();
        for (id, entry) in &self.infra {
            if !entry.requires_infra.is_empty() {
                tables
                    .infra_infra
                    .insert(id.clone(), entry.requires_infra.clone());
            }
        }
        for (id, entry) in &self.services {
            if !entry.requires_infra.is_empty() {
                tables
                    .service_infra
                    .insert(id.clone(), entry.requires_infra.clone());
            }
            if !entry.requires_services.is_empty() {
                tables
                    .service_service
                    .insert(id.clone(), entry.requires_services.clone());
            }
        }
        tables
    }

    /// Deployment details for a catalog identifier
    pub fn unit_spec(&self, kind: Kind, id: &str) -> Option<UnitSpec> {
        let entry = self.get(kind, id)?;
        let name = match (&entry.unit, kind) {
            (Some(unit), _) => unit.clone(),
            (None, Kind::Infra) => format!("{}{}", self.units.infra_prefix, id),
            (None, Kind::Service) => id.to_string(),
        };

        Some(UnitSpec {
            kind,
            id: id.to_string(),
            display_name: entry.name.clone(),
            name,
            repository: entry.repository.clone(),
            branch: entry.branch.clone(),
            ref_name: entry.ref_name.clone(),
            path: entry.path.clone(),
            namespace: entry
                .namespace
                .clone()
                .unwrap_or_else(|| self.units.namespace.clone()),
        })
    }

    /// Overlay service records from a snapshot onto known services
    ///
    /// Lets a snapshot pin a branch or ref for a service. Records for
    /// services the catalog no longer knows are ignored.
    pub fn apply_service_records(&mut self, records: &BTreeMap<String, ServiceRecord>) {
        for (id, record) in records {
            match self.services.get_mut(id) {
                Some(entry) => {
                    entry.name = record.name.clone();
                    entry.repository = record.repository.clone();
                    entry.branch = record.branch.clone();
                    entry.ref_name = record.ref_name.clone();
                }
                None => log::warn!("ignoring record for unknown service '{}'", id),
            }
        }
    }

    /// Check that every dependency and default names a known entry
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (kind, entries) in [(Kind::Infra, &self.infra), (Kind::Service, &self.services)] {
            for (id, entry) in entries {
                for dep in &entry.requires_infra {
                    if !self.infra.contains_key(dep) {
                        problems.push(format!("{kind} '{id}' requires unknown infra '{dep}'"));
                    }
                }
                for dep in &entry.requires_services {
                    if kind == Kind::Infra {
                        problems.push(format!("infra '{id}' cannot require services"));
                        break;
                    }
                    if !self.services.contains_key(dep) {
                        problems.push(format!("service '{id}' requires unknown service '{dep}'"));
                    }
                }
            }
        }

        for (kind, id) in self.unknown(&self.defaults) {
            problems.push(format!("default {kind} '{id}' is not in the catalog"));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Catalog {
                message: problems.join("; "),
            })
        }
    }
}

/// Immutable dependency lookup tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyTables {
    pub infra_infra: BTreeMap<String, Vec<String>>,
    pub service_infra: BTreeMap<String, Vec<String>>,
    pub service_service: BTreeMap<String, Vec<String>>,
}

impl DependencyTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_infra(mut self, infra: &str, requires: &[&str]) -> Self {
        self.infra_infra.insert(infra.to_string(), to_owned(requires));
        self
    }

    pub fn with_service_infra(mut self, service: &str, requires: &[&str]) -> Self {
        self.service_infra
            .insert(service.to_string(), to_owned(requires));
        self
    }

    pub fn with_service_services(mut self, service: &str, requires: &[&str]) -> Self {
        self.service_service
            .insert(service.to_string(), to_owned(requires));
        self
    }
}

fn to_owned(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            repository: format!("https://example.com/{name}.git"),
            branch: Some("main".to_string()),
            ref_name: None,
            unit: None,
            path: None,
            namespace: None,
            arm64: true,
            requires_infra: Vec::new(),
            requires_services: Vec::new(),
        }
    }

    fn sample() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.infra.insert("postgresql".into(), entry("PostgreSQL"));
        let mut keycloak = entry("Keycloak");
        keycloak.requires_infra = vec!["postgresql".into()];
        catalog.infra.insert("keycloak".into(), keycloak);
        let mut exasol = entry("Exasol");
        exasol.arm64 = false;
        catalog.infra.insert("exasol".into(), exasol);

        let mut iam = entry("IAM");
        iam.requires_infra = vec!["keycloak".into()];
        iam.requires_services = vec!["notification".into()];
        iam.path = Some("k8s".into());
        catalog.services.insert("iam".into(), iam);
        catalog
            .services
            .insert("notification".into(), entry("Notification"));
        catalog
    }

    #[test]
    fn test_dependency_tables_from_entries() {
        let tables = sample().dependency_tables();
        assert_eq!(tables.infra_infra["keycloak"], vec!["postgresql"]);
        assert_eq!(tables.service_infra["iam"], vec!["keycloak"]);
        assert_eq!(tables.service_service["iam"], vec!["notification"]);
        assert!(!tables.infra_infra.contains_key("postgresql"));
    }

    #[test]
    fn test_unit_spec_naming() {
        let catalog = sample();
        let infra = catalog.unit_spec(Kind::Infra, "postgresql").unwrap();
        assert_eq!(infra.name, "pulse8-core-env-postgresql");
        assert_eq!(infra.source_name(), "pulse8-core-env-postgresql-repo");
        assert_eq!(infra.namespace, "default");

        let service = catalog.unit_spec(Kind::Service, "iam").unwrap();
        assert_eq!(service.name, "iam");
        assert_eq!(service.path.as_deref(), Some("k8s"));

        assert!(catalog.unit_spec(Kind::Infra, "retired").is_none());
    }

    #[test]
    fn test_selectable_hides_unsupported_on_arm64() {
        let catalog = sample();
        let arm: Vec<_> = catalog
            .selectable(Kind::Infra, true)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert!(!arm.contains(&"exasol"));
        assert_eq!(catalog.selectable(Kind::Infra, false).len(), 3);
    }

    #[test]
    fn test_validate_reports_unknown_dependencies() {
        let mut catalog = sample();
        assert!(catalog.validate().is_ok());

        catalog
            .services
            .get_mut("notification")
            .unwrap()
            .requires_infra
            .push("kafka".into());
        let err = catalog.validate().unwrap_err().to_string();
        assert!(err.contains("unknown infra 'kafka'"));
    }

    #[test]
    fn test_apply_service_records_pins_branch() {
        let mut catalog = sample();
        let mut records = BTreeMap::new();
        records.insert(
            "iam".to_string(),
            ServiceRecord {
                name: "IAM".into(),
                repository: "https://example.com/iam-fork.git".into(),
                branch: Some("feature/x".into()),
                ref_name: None,
                suspend: false,
            },
        );
        records.insert(
            "retired".to_string(),
            ServiceRecord {
                name: "Retired".into(),
                repository: "https://example.com/retired.git".into(),
                branch: None,
                ref_name: None,
                suspend: true,
            },
        );

        catalog.apply_service_records(&records);
        let iam = catalog.get(Kind::Service, "iam").unwrap();
        assert_eq!(iam.branch.as_deref(), Some("feature/x"));
        assert!(iam.repository.ends_with("iam-fork.git"));
        assert!(!catalog.contains(Kind::Service, "retired"));
    }
}
