//! Diff between a previous snapshot and a new selection

use crate::snapshot::Snapshot;
use crate::types::{Action, Kind, Selection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Compute the ordered actions that move an environment to `new`
///
/// Installs come first (infra, then services) for everything in the new
/// selection, whether or not it was present before. Uninstalls follow, and
/// only when there is a previous snapshot: infra in `old - new`, and services
/// that were running in `old` (not suspended) but are no longer selected.
pub fn compute_actions(old: Option<&Snapshot>, new: &Selection) -> Vec<Action> {
    let mut actions: Vec<Action> = new
        .infra
        .iter()
        .map(|id| Action::install(Kind::Infra, id))
        .chain(new.services.iter().map(|id| Action::install(Kind::Service, id)))
        .collect();

    if let Some(old) = old {
        let old_infra: BTreeSet<&String> = old.infra.iter().collect();
        for id in old_infra {
            if !new.infra.contains(id) {
                actions.push(Action::uninstall(Kind::Infra, id));
            }
        }

        for id in old.active_services() {
            if !new.services.contains(id) {
                actions.push(Action::uninstall(Kind::Service, id));
            }
        }
    }

    actions
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub installs: usize,
    pub uninstalls: usize,
}

impl DiffSummary {
    pub fn from_actions(actions: &[Action]) -> Self {
        let installs = actions.iter().filter(|a| a.is_install()).count();
        Self {
            installs,
            uninstalls: actions.len() - installs,
        }
    }

    pub fn total(&self) -> usize {
        self.installs + self.uninstalls
    }

    pub fn has_uninstalls(&self) -> bool {
        self.uninstalls > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ServiceRecord;

    fn record(suspend: bool) -> ServiceRecord {
        ServiceRecord {
            name: "svc".into(),
            repository: "https://example.com/svc.git".into(),
            branch: None,
            ref_name: None,
            suspend,
        }
    }

    fn snapshot(infra: &[&str], services: &[(&str, bool)]) -> Snapshot {
        Snapshot {
            name: "dev".into(),
            infra: infra.iter().map(|s| (*s).to_string()).collect(),
            services: services
                .iter()
                .map(|(id, suspend)| ((*id).to_string(), record(*suspend)))
                .collect(),
        }
    }

    fn uninstalls(actions: &[Action], kind: Kind) -> BTreeSet<String> {
        actions
            .iter()
            .filter(|a| a.is_uninstall() && a.kind() == kind)
            .map(|a| a.id().to_string())
            .collect()
    }

    #[test]
    fn test_removed_infra_and_running_service_are_uninstalled() {
        let old = snapshot(&["postgresql", "kafka"], &[("iam", false)]);
        let new = Selection::new(["kafka"], Vec::<String>::new());

        let actions = compute_actions(Some(&old), &new);

        assert_eq!(
            actions,
            vec![
                Action::install(Kind::Infra, "kafka"),
                Action::uninstall(Kind::Infra, "postgresql"),
                Action::uninstall(Kind::Service, "iam"),
            ]
        );
    }

    #[test]
    fn test_first_creation_only_installs() {
        let new = Selection::new(["redis"], Vec::<String>::new());
        let actions = compute_actions(None, &new);
        assert_eq!(actions, vec![Action::install(Kind::Infra, "redis")]);
    }

    #[test]
    fn test_suspended_service_is_not_uninstalled_again() {
        let old = snapshot(&[], &[("iam", true), ("notification", false)]);
        let actions = compute_actions(Some(&old), &Selection::default());

        assert_eq!(
            actions,
            vec![Action::uninstall(Kind::Service, "notification")]
        );
    }

    #[test]
    fn test_installs_precede_uninstalls() {
        let old = snapshot(&["a", "b"], &[("s1", false), ("s2", false)]);
        let new = Selection::new(["b", "c"], ["s2", "s3"]);

        let actions = compute_actions(Some(&old), &new);
        let first_uninstall = actions.iter().position(Action::is_uninstall).unwrap();
        assert!(actions[..first_uninstall].iter().all(Action::is_install));
        assert!(actions[first_uninstall..].iter().all(Action::is_uninstall));

        // infra before services within each group
        assert_eq!(actions[0], Action::install(Kind::Infra, "b"));
        assert_eq!(actions[2], Action::install(Kind::Service, "s2"));
    }

    #[test]
    fn test_uninstalls_are_exactly_the_difference() {
        let old = snapshot(
            &["a", "b", "c", "b"],
            &[("s1", false), ("s2", true), ("s3", false), ("s4", false)],
        );
        let new = Selection::new(["c", "d"], ["s3"]);

        let actions = compute_actions(Some(&old), &new);

        let expected_infra: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let expected_services: BTreeSet<String> =
            ["s1", "s4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(uninstalls(&actions, Kind::Infra), expected_infra);
        assert_eq!(uninstalls(&actions, Kind::Service), expected_services);

        let summary = DiffSummary::from_actions(&actions);
        assert_eq!(summary.installs, 3);
        assert_eq!(summary.uninstalls, 4);
    }

    #[test]
    fn test_unchanged_selection_reinstalls_without_uninstalls() {
        let old = snapshot(&["kafka"], &[("iam", false)]);
        let new = old.selection();
        let actions = compute_actions(Some(&old), &new);

        assert_eq!(actions.len(), 2);
        assert!(!DiffSummary::from_actions(&actions).has_uninstalls());
    }
}
