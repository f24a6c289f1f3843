use chrono::{DateTime, TimeZone, Utc};
use labsync_reconcile::*;
use labsync_schemas::{Accession, TestDetail};

fn at(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, h, 0, 0).unwrap()
}

fn result(test: &str, panel: Option<&str>, value: &str, h: u32) -> TestDetail {
    TestDetail {
        test_uuid: test.to_string(),
        panel_uuid: panel.map(str::to_string),
        test_name: Some(test.to_uppercase()),
        result: Some(value.to_string()),
        result_type: Some("N".to_string()),
        test_unit_of_measurement: Some("g/dL".to_string()),
        abnormal: Some(false),
        provider_uuid: Some("prov-1".to_string()),
        date_time: Some(at(h)),
        status: None,
    }
}

fn visit_with_orders(concepts: &[&str]) -> Visit {
    let mut visit = Visit::new("v1", "pat-1", at(7));
    let mut enc = Encounter::new("acc-1", "v1", "pat-1", EncounterType::new("t-ord", "INVESTIGATION"), at(8));
    for c in concepts {
        enc.orders.push(Order::new(format!("order-{c}"), *c));
    }
    visit.add_encounter(enc);
    visit
}

fn pass(visit: &mut Visit, details: Vec<TestDetail>) -> ReconcileReport {
    let acc = Accession {
        accession_uuid: "acc-1".to_string(),
        patient_uuid: "pat-1".to_string(),
        date_time: at(8),
        test_details: details,
    };
    let ty = EncounterType::new("t-res", "LAB_RESULT");
    let role = EncounterRole::new("role-unknown", "Unknown");
    let dir = StaticProviderDirectory::new(vec![
        Provider::new("prov-1", "LAB01", "Lab Tech"),
        Provider::new("prov-sys", "system", "System"),
    ]);
    let ctx = ReconcileContext {
        result_encounter_type: &ty,
        unknown_role: &role,
        providers: &dir,
        fallback_provider_identifier: "system",
    };
    reconcile_results(visit, "acc-1", &acc, &ctx).unwrap()
}

#[test]
fn scenario_first_result_creates_one_encounter_and_one_observation() {
    let mut visit = visit_with_orders(&["hb"]);
    let r = pass(&mut visit, vec![result("hb", None, "12.5", 9)]);

    assert_eq!(r.created_encounters.len(), 1);
    assert_eq!(r.created_observations, 1);
    assert_eq!(r.voided_observations, 0);
    assert!(r.has_mutations());

    let obs = visit.active_observations_for("hb");
    assert_eq!(obs.len(), 1);
    assert_eq!(obs[0].value, Some(ObsValue::Numeric(12.5)));
    assert_eq!(obs[0].order_uuid.as_deref(), Some("order-hb"));

    let enc = visit.encounter(&r.created_encounters[0]).unwrap();
    assert_eq!(enc.encounter_datetime, at(8), "stamped with the accession date");
    assert_eq!(enc.patient_uuid, "pat-1");
    assert_eq!(enc.provider.as_ref().unwrap().role.uuid, "role-unknown");
}

#[test]
fn scenario_unchanged_redelivery_mutates_nothing() {
    let mut visit = visit_with_orders(&["hb", "cbc"]);
    let details = vec![
        result("hb", None, "12.5", 9),
        result("wbc", Some("cbc"), "4.1", 9),
        result("rbc", Some("cbc"), "5.0", 9),
    ];
    pass(&mut visit, details.clone());
    let snapshot = visit.clone();

    let second = pass(&mut visit, details);
    assert!(!second.has_mutations());
    assert_eq!(second.unchanged, 3);
    assert_eq!(visit, snapshot);
}

#[test]
fn scenario_monotonic_corrections_keep_one_active_observation() {
    let mut visit = visit_with_orders(&["hb"]);
    for (i, h) in [9u32, 10, 10, 11, 12].iter().enumerate() {
        pass(&mut visit, vec![result("hb", None, &format!("12.{i}"), *h)]);
        assert_eq!(visit.active_observations_for("hb").len(), 1, "after pass {i}");
    }

    let voided = visit
        .all_observations()
        .into_iter()
        .filter(|o| o.concept_uuid == "hb" && o.voided)
        .count();
    assert_eq!(voided, 3, "one void per distinct later timestamp");
    assert_eq!(visit.encounters().len(), 2, "order encounter plus one result encounter");
}
