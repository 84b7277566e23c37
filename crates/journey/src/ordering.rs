//! Step ordering — applies a persisted custom order on top of the catalog.

use std::collections::HashSet;

use funnel_core::StepDefinition;
use tracing::debug;

/// Resolves the funnel order.
///
/// Steps named in `persisted_ids` come first, in that order, followed by the
/// remaining catalog steps in catalog order. Ids with no catalog entry are
/// dropped and repeated ids are taken once, so the result always holds
/// exactly the catalog's ids.
pub fn resolve_order(
    catalog: &[StepDefinition],
    persisted_ids: Option<&[String]>,
) -> Vec<StepDefinition> {
    let Some(ids) = persisted_ids else {
        return catalog.to_vec();
    };

    let mut placed: HashSet<&str> = HashSet::with_capacity(catalog.len());
    let mut ordered = Vec::with_capacity(catalog.len());

    for id in ids {
        match catalog.iter().find(|s| &s.id == id) {
            Some(step) if placed.insert(step.id.as_str()) => ordered.push(step.clone()),
            Some(_) => debug!(step_id = %id, "repeated id in persisted order ignored"),
            None => debug!(step_id = %id, "persisted order names an unknown step, dropped"),
        }
    }

    ordered.extend(
        catalog
            .iter()
            .filter(|s| !placed.contains(s.id.as_str()))
            .cloned(),
    );
    ordered
}

/// Moves the id at `from` to position `to` and returns the new id list.
/// Out-of-range positions are clamped to the list bounds.
pub fn reorder(ids: &[String], from: usize, to: usize) -> Vec<String> {
    let mut ids = ids.to_vec();
    if ids.is_empty() {
        return ids;
    }
    let last = ids.len() - 1;
    let moved = ids.remove(from.min(last));
    ids.insert(to.min(last), moved);
    ids
}
