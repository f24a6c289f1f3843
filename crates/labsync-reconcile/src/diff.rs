use labsync_schemas::{Accession, TestDetail};

use crate::types::Encounter;

/// Structural difference between a fetched accession and the order encounter
/// previously materialized for it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    /// Details whose orderable concept has no active order yet.
    pub added: Vec<TestDetail>,
    /// Cancelled details whose orderable concept still has an active order.
    pub removed: Vec<TestDetail>,
}

impl ChangeSet {
    pub fn has_difference(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

pub fn diff(accession: &Accession, prior: &Encounter) -> ChangeSet {
    let has_active_order = |concept: &str| prior.active_orders().any(|o| o.concept_uuid == concept);

    let mut out = ChangeSet::default();
    let mut seen: Vec<&str> = Vec::new();

    for detail in &accession.test_details {
        let concept = detail.orderable_uuid();
        if seen.contains(&concept) {
            continue;
        }

        if detail.is_canceled() {
            if has_active_order(concept) {
                out.removed.push(detail.clone());
                seen.push(concept);
            }
        } else if !has_active_order(concept) {
            out.added.push(detail.clone());
            seen.push(concept);
        }
    }
    out
}
