//! Dependency resolver
//!
//! Expands a selection in place until it is closed under the dependency
//! tables. The tables shipped today are one level deep, but the expansion is
//! iterated to a fixpoint so deeper chains (service -> service -> infra ->
//! infra) close as well.

use crate::catalog::DependencyTables;
use crate::types::Selection;
use std::collections::BTreeMap;

/// Close a selection under the dependency tables
///
/// Identifiers without a table entry contribute nothing; identifiers the
/// catalog does not know are kept as-is. Never fails.
pub fn resolve(selection: &mut Selection, tables: &DependencyTables) {
    let mut rounds = 0;
    loop {
        let before = selection.len();

        expand_infra(selection, tables);
        expand_services(selection, tables);
        // newly added services may bring infra of their own
        expand_infra(selection, tables);

        rounds += 1;
        if selection.len() == before {
            break;
        }
    }
    log::debug!(
        "resolved selection in {} round(s): infra={:?} services={:?}",
        rounds,
        selection.infra,
        selection.services
    );
}

/// Non-mutating variant of [`resolve`]
pub fn resolved(selection: &Selection, tables: &DependencyTables) -> Selection {
    let mut closed = selection.clone();
    resolve(&mut closed, tables);
    closed
}

fn expand_infra(selection: &mut Selection, tables: &DependencyTables) {
    let mut needed = dependencies_of(&selection.infra, &tables.infra_infra);
    needed.extend(dependencies_of(&selection.services, &tables.service_infra));
    selection.infra.extend(needed);
}

fn expand_services(selection: &mut Selection, tables: &DependencyTables) {
    let needed = dependencies_of(&selection.services, &tables.service_service);
    selection.services.extend(needed);
}

fn dependencies_of<'a>(
    ids: impl IntoIterator<Item = &'a String>,
    table: &BTreeMap<String, Vec<String>>,
) -> Vec<String> {
    ids.into_iter()
        .filter_map(|id| table.get(id))
        .flatten()
        .cloned()
        .collect()
}
