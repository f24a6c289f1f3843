use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use labsync_schemas::{Accession, TestDetail};
use serde::Serialize;

use crate::error::ReconcileError;
use crate::matcher::{find_order, find_result_location, is_result_encounter_for};
use crate::provider::{ProviderDirectory, ProviderResolver};
use crate::types::{
    new_uuid, Encounter, EncounterRole, EncounterType, ObsLocation, ObsValue, Observation, Order,
    Provider, Visit,
};

/// Void reason stamped on an observation replaced by a newer result.
pub const VOID_REASON_UPDATED: &str = "updated result received from lab";

/// Void reason stamped on a panel grouping left without active members.
pub const VOID_REASON_EMPTY_GROUP: &str = "panel grouping left without active members";

/// Lookups resolved once per pass by the caller.
pub struct ReconcileContext<'a> {
    pub result_encounter_type: &'a EncounterType,
    pub unknown_role: &'a EncounterRole,
    pub providers: &'a dyn ProviderDirectory,
    pub fallback_provider_identifier: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileAnomaly {
    /// A result arrived for a concept with no order on the order encounter.
    MissingOrder {
        test_uuid: String,
        orderable_uuid: String,
    },
}

/// What one pass did to the visit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Uuids of result encounters created in this pass.
    pub created_encounters: Vec<String>,
    /// Observations created, panel groupings included.
    pub created_observations: usize,
    /// Observations voided, panel groupings included.
    pub voided_observations: usize,
    /// Results whose stored observation already carries the same timestamp.
    pub unchanged: usize,
    /// Details without a result yet.
    pub pending: usize,
    pub anomalies: Vec<ReconcileAnomaly>,
}

impl ReconcileReport {
    pub fn has_mutations(&self) -> bool {
        !self.created_encounters.is_empty()
            || self.created_observations > 0
            || self.voided_observations > 0
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn result_value(detail: &TestDetail) -> Result<Option<ObsValue>, ReconcileError> {
    let Some(raw) = detail.result_value() else {
        return Ok(None);
    };
    if !detail.is_numeric() {
        return Ok(Some(ObsValue::Text(raw.to_string())));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(ObsValue::Numeric(v))),
        _ => Err(ReconcileError::InvalidResultValue {
            test_uuid: detail.test_uuid.clone(),
            value: raw.to_string(),
        }),
    }
}

/// Stored observation times carry microseconds; incoming ones are cut to
/// the same precision so a reloaded observation compares equal.
fn result_timestamp(detail: &TestDetail) -> Result<DateTime<Utc>, ReconcileError> {
    detail
        .date_time
        .map(|t| t.trunc_subsecs(6))
        .ok_or_else(|| ReconcileError::MissingResultTimestamp {
            test_uuid: detail.test_uuid.clone(),
        })
}

/// Every resulted detail must carry a usable value and timestamp before the
/// visit is touched at all.
pub fn validate_results(accession: &Accession) -> Result<(), ReconcileError> {
    for detail in accession.resulted_tests() {
        result_value(detail)?;
        result_timestamp(detail)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Void the observation at `loc`; a grouping left empty is voided too.
/// Returns the number of records voided.
fn void_stale(visit: &mut Visit, loc: &ObsLocation) -> usize {
    let Some(obs) = visit.observation_at_mut(loc) else {
        return 0;
    };
    obs.void(VOID_REASON_UPDATED);
    let mut voided = 1;

    if loc.member.is_some() {
        let group_loc = ObsLocation {
            member: None,
            ..loc.clone()
        };
        if let Some(group) = visit.observation_at_mut(&group_loc) {
            if group.active_members().next().is_none() {
                group.void(VOID_REASON_EMPTY_GROUP);
                voided += 1;
            }
        }
    }
    voided
}

/// Attach a new observation for `detail`, nesting panel members under the
/// encounter's grouping. Returns the number of records created.
fn attach_result(
    encounter: &mut Encounter,
    detail: &TestDetail,
    order: &Order,
    at: DateTime<Utc>,
    value: Option<ObsValue>,
) -> usize {
    let mut obs = Observation::new(detail.test_uuid.clone(), at)
        .with_order(order.uuid.clone())
        .with_abnormal(detail.abnormal);
    obs.value = value;

    let Some(panel) = detail.panel() else {
        encounter.add_obs(obs);
        return 1;
    };

    if let Some(group) = encounter
        .observations
        .iter_mut()
        .find(|o| !o.voided && o.concept_uuid == panel)
    {
        group.group_members.push(obs);
        return 1;
    }

    encounter.add_obs(
        Observation::new(panel, at)
            .with_order(order.uuid.clone())
            .with_member(obs),
    );
    2
}

/// Details taking part in the pass, in document order. A test resulted more
/// than once in the same document only counts with its last resulted entry.
fn effective_details(accession: &Accession) -> Vec<&TestDetail> {
    let mut last: HashMap<(Option<&str>, &str), usize> = HashMap::new();
    for (i, d) in accession.test_details.iter().enumerate() {
        if d.has_result() {
            last.insert((d.panel(), d.test_uuid.as_str()), i);
        }
    }
    accession
        .test_details
        .iter()
        .enumerate()
        .filter(|(i, d)| !d.has_result() || last.get(&(d.panel(), d.test_uuid.as_str())) == Some(i))
        .map(|(_, d)| d)
        .collect()
}

fn new_result_encounter(
    visit: &Visit,
    accession: &Accession,
    provider: Provider,
    ctx: &ReconcileContext<'_>,
) -> Encounter {
    Encounter::new(
        new_uuid(),
        visit.uuid.clone(),
        visit.patient_uuid.clone(),
        ctx.result_encounter_type.clone(),
        accession.effective_date(),
    )
    .with_provider(provider, ctx.unknown_role.clone())
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// Reconcile every result of `accession` into the result encounters of
/// `visit`. Orders are looked up on the encounter `order_encounter_uuid`.
///
/// Unchanged results (same concept, same timestamp) are no-ops, so running
/// the pass twice over the same accession mutates nothing the second time.
/// On `Err` the visit must be discarded by the caller.
pub fn reconcile_results(
    visit: &mut Visit,
    order_encounter_uuid: &str,
    accession: &Accession,
    ctx: &ReconcileContext<'_>,
) -> Result<ReconcileReport, ReconcileError> {
    validate_results(accession)?;

    let orders = visit
        .encounter(order_encounter_uuid)
        .ok_or_else(|| ReconcileError::OrderEncounterNotInVisit {
            encounter_uuid: order_encounter_uuid.to_string(),
        })?
        .orders
        .clone();

    let mut resolver = ProviderResolver::new(ctx.providers, ctx.fallback_provider_identifier);
    let mut report = ReconcileReport::default();

    for detail in effective_details(accession) {
        if !detail.has_result() {
            report.pending += 1;
            continue;
        }

        let Some(order) = find_order(&orders, detail) else {
            tracing::warn!(
                accession = %accession.accession_uuid,
                test = %detail.test_uuid,
                orderable = %detail.orderable_uuid(),
                "no order found for result, skipping"
            );
            report.anomalies.push(ReconcileAnomaly::MissingOrder {
                test_uuid: detail.test_uuid.clone(),
                orderable_uuid: detail.orderable_uuid().to_string(),
            });
            continue;
        };

        let at = result_timestamp(detail)?;
        let value = result_value(detail)?;
        let existing = find_result_location(visit, ctx.result_encounter_type, detail);

        if let Some(loc) = &existing {
            if visit.observation_at(loc).map(|o| o.obs_datetime.trunc_subsecs(6)) == Some(at) {
                report.unchanged += 1;
                continue;
            }
        }

        let provider = resolver.resolve(detail.provider())?;

        if let Some(loc) = &existing {
            tracing::debug!(test = %detail.test_uuid, encounter = %loc.encounter_uuid, "voiding stale result");
            report.voided_observations += void_stale(visit, loc);
        }

        let provider_uuid = provider.uuid.clone();
        let fresh = new_result_encounter(visit, accession, provider, ctx);
        let (encounter, created) = visit.find_or_add_encounter(
            |e| is_result_encounter_for(e, ctx.result_encounter_type, &provider_uuid),
            || fresh,
        );
        if created {
            report.created_encounters.push(encounter.uuid.clone());
        }
        report.created_observations += attach_result(encounter, detail, order, at, value);
    }

    tracing::debug!(
        accession = %accession.accession_uuid,
        created_encounters = report.created_encounters.len(),
        created = report.created_observations,
        voided = report.voided_observations,
        unchanged = report.unchanged,
        anomalies = report.anomalies.len(),
        "result pass finished"
    );
    Ok(report)
}
