//! Identity matching between accession test details and local records.
//!
//! Concepts are compared by stable uuid only; names never participate.

use labsync_schemas::TestDetail;

use crate::types::{Encounter, EncounterType, ObsLocation, Order, Visit};

/// Top-level index and optional member index of the non-voided observation
/// for `detail` inside `encounter`.
pub fn find_result_obs(encounter: &Encounter, detail: &TestDetail) -> Option<(usize, Option<usize>)> {
    match detail.panel() {
        Some(panel) => {
            let (top, group) = encounter
                .observations
                .iter()
                .enumerate()
                .find(|(_, o)| !o.voided && o.concept_uuid == panel)?;
            let member = group
                .group_members
                .iter()
                .position(|m| !m.voided && m.concept_uuid == detail.test_uuid)?;
            Some((top, Some(member)))
        }
        None => encounter
            .observations
            .iter()
            .position(|o| !o.voided && o.concept_uuid == detail.test_uuid)
            .map(|top| (top, None)),
    }
}

/// Scan every non-voided result encounter of the visit for the observation
/// matching `detail`. First hit in encounter order wins.
pub fn find_result_location(
    visit: &Visit,
    result_type: &EncounterType,
    detail: &TestDetail,
) -> Option<ObsLocation> {
    visit
        .encounters()
        .iter()
        .filter(|e| !e.voided && e.is_of_type(result_type))
        .find_map(|e| {
            find_result_obs(e, detail).map(|(top, member)| ObsLocation {
                encounter_uuid: e.uuid.clone(),
                top,
                member,
            })
        })
}

/// Whether `encounter` is the live result encounter of `result_type` owned by
/// `provider_uuid`.
pub fn is_result_encounter_for(
    encounter: &Encounter,
    result_type: &EncounterType,
    provider_uuid: &str,
) -> bool {
    !encounter.voided
        && encounter.is_of_type(result_type)
        && encounter.provider_uuid() == Some(provider_uuid)
}

/// Result encounter of `result_type` owned by `provider_uuid`, if one exists.
pub fn find_result_encounter<'v>(
    visit: &'v Visit,
    result_type: &EncounterType,
    provider_uuid: &str,
) -> Option<&'v Encounter> {
    visit
        .encounters()
        .iter()
        .find(|e| is_result_encounter_for(e, result_type, provider_uuid))
}

/// Order placed for the detail's orderable concept (panel if any, else the
/// test). A non-voided order wins over a voided one.
pub fn find_order<'o>(orders: &'o [Order], detail: &TestDetail) -> Option<&'o Order> {
    let concept = detail.orderable_uuid();
    let mut voided_hit = None;
    for order in orders.iter().filter(|o| o.concept_uuid == concept) {
        if !order.voided {
            return Some(order);
        }
        voided_hit.get_or_insert(order);
    }
    voided_hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EncounterRole, Observation, Provider};
    use chrono::{TimeZone, Utc};

    fn detail(test: &str, panel: Option<&str>) -> TestDetail {
        TestDetail {
            test_uuid: test.to_string(),
            panel_uuid: panel.map(str::to_string),
            test_name: None,
            result: Some("1".to_string()),
            result_type: None,
            test_unit_of_measurement: None,
            abnormal: None,
            provider_uuid: None,
            date_time: None,
            status: None,
        }
    }

    fn result_type() -> EncounterType {
        EncounterType::new("t-res", "LAB_RESULT")
    }

    #[test]
    fn panel_member_is_found_inside_active_grouping_only() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut voided_group = Observation::new("cbc", at).with_member(Observation::new("wbc", at));
        voided_group.void("old");
        let live_group = Observation::new("cbc", at)
            .with_member(Observation::new("rbc", at))
            .with_member(Observation::new("wbc", at));
        let enc = Encounter::new("e1", "v1", "p1", result_type(), at)
            .with_obs(voided_group)
            .with_obs(live_group);

        assert_eq!(find_result_obs(&enc, &detail("wbc", Some("cbc"))), Some((1, Some(1))));
        assert_eq!(find_result_obs(&enc, &detail("wbc", None)), None, "members are not top-level");
        assert_eq!(find_result_obs(&enc, &detail("plt", Some("cbc"))), None);
    }

    #[test]
    fn location_scan_skips_other_types_and_voided_encounters() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut visit = Visit::new("v1", "p1", at);
        visit.add_encounter(
            Encounter::new("order", "v1", "p1", EncounterType::new("t-ord", "INVESTIGATION"), at)
                .with_obs(Observation::new("hb", at)),
        );
        let mut dead = Encounter::new("dead", "v1", "p1", result_type(), at).with_obs(Observation::new("hb", at));
        dead.voided = true;
        visit.add_encounter(dead);
        visit.add_encounter(
            Encounter::new("res", "v1", "p1", result_type(), at)
                .with_provider(Provider::new("pr", "LAB", "Lab"), EncounterRole::new("r", "Unknown"))
                .with_obs(Observation::new("hb", at)),
        );

        let loc = find_result_location(&visit, &result_type(), &detail("hb", None)).unwrap();
        assert_eq!(loc.encounter_uuid, "res");
        assert_eq!(find_result_encounter(&visit, &result_type(), "pr").unwrap().uuid, "res");
        assert!(find_result_encounter(&visit, &result_type(), "other").is_none());
    }

    #[test]
    fn order_lookup_uses_panel_and_prefers_active() {
        let mut stale = Order::new("o-old", "cbc");
        stale.voided = true;
        let orders = vec![stale, Order::new("o-new", "cbc"), Order::new("o-hb", "hb")];

        assert_eq!(find_order(&orders, &detail("wbc", Some("cbc"))).unwrap().uuid, "o-new");
        assert_eq!(find_order(&orders, &detail("hb", None)).unwrap().uuid, "o-hb");
        assert!(find_order(&orders, &detail("wbc", None)).is_none());
        assert_eq!(find_order(&orders[..1], &detail("x", Some("cbc"))).unwrap().uuid, "o-old");
    }
}
