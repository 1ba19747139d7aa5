//! Interactive selection of infrastructure and services

use anyhow::{Context, Result};
use dialoguer::{Confirm, MultiSelect};
use envkit::{Catalog, Kind, Selection};
use std::collections::BTreeSet;

use crate::cli::SelectArgs;

/// One entry of a selection prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: String,
    pub label: String,
    pub checked: bool,
}

/// Prompt entries for one kind, preselected from `current`
///
/// Entries that do not run on this host are left out.
pub fn choices(
    catalog: &Catalog,
    kind: Kind,
    current: &Selection,
    arm64_host: bool,
) -> Vec<Choice> {
    catalog
        .selectable(kind, arm64_host)
        .into_iter()
        .map(|(id, entry)| Choice {
            id: id.to_string(),
            label: format!("{} ({id})", entry.name),
            checked: current.contains(kind, id),
        })
        .collect()
}

/// Selection from `--infra/--services`, keeping the preselection for the other kind
pub fn from_flags(args: &SelectArgs, preselection: &Selection) -> Selection {
    let infra = match &args.infra {
        Some(ids) => clean_ids(ids),
        None => preselection.infra.clone(),
    };
    let services = match &args.services {
        Some(ids) => clean_ids(ids),
        None => preselection.services.clone(),
    };
    Selection { infra, services }
}

fn clean_ids(ids: &[String]) -> BTreeSet<String> {
    ids.iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Ask for infra, then services
pub fn select(catalog: &Catalog, preselection: &Selection, arm64_host: bool) -> Result<Selection> {
    let infra = multi_select(
        "Select infrastructure (space to toggle, enter to confirm)",
        &choices(catalog, Kind::Infra, preselection, arm64_host),
    )?;
    let services = multi_select(
        "Select services (space to toggle, enter to confirm)",
        &choices(catalog, Kind::Service, preselection, arm64_host),
    )?;
    Ok(Selection::new(infra, services))
}

fn multi_select(prompt: &str, choices: &[Choice]) -> Result<Vec<String>> {
    let labels: Vec<&str> = choices.iter().map(|c| c.label.as_str()).collect();
    let defaults: Vec<bool> = choices.iter().map(|c| c.checked).collect();

    let picked = MultiSelect::new()
        .with_prompt(prompt)
        .items(&labels)
        .defaults(&defaults)
        .interact()
        .context("Failed to read selection")?;

    Ok(picked.into_iter().map(|i| choices[i].id.clone()).collect())
}

/// Confirm with user
pub fn confirm(prompt: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()?;

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn test_choices_are_preselected() {
        let catalog = catalog::builtin().unwrap();
        let current = Selection::new(["kafka"], Vec::<String>::new());

        let infra = choices(&catalog, Kind::Infra, &current, false);
        assert_eq!(infra.len(), 13);
        let kafka = infra.iter().find(|c| c.id == "kafka").unwrap();
        assert!(kafka.checked);
        assert_eq!(kafka.label, "Kafka (Confluent for Kubernetes) (kafka)");
        assert_eq!(infra.iter().filter(|c| c.checked).count(), 1);
    }

    #[test]
    fn test_choices_hide_unsupported_entries() {
        let catalog = catalog::builtin().unwrap();
        let infra = choices(&catalog, Kind::Infra, &Selection::default(), true);
        assert!(infra.iter().all(|c| c.id != "exasol"));
    }

    #[test]
    fn test_flags_override_one_kind() {
        let preselection = Selection::new(["postgresql", "kafka"], ["pulse8-core-iam"]);
        let args = SelectArgs {
            infra: Some(vec!["redis".into(), " ".into()]),
            ..Default::default()
        };

        let selection = from_flags(&args, &preselection);
        assert_eq!(selection, Selection::new(["redis"], ["pulse8-core-iam"]));
    }

    #[test]
    fn test_flags_can_clear_services() {
        let preselection = Selection::new(["kafka"], ["pulse8-core-iam"]);
        let args = SelectArgs {
            services: Some(Vec::new()),
            ..Default::default()
        };

        assert!(from_flags(&args, &preselection).services.is_empty());
    }
}
