use std::sync::Arc;

use labsync_reconcile::ObsValue;
use labsync_runtime::OrderEncounterChange;
use labsync_testkit::{event_for, fixture_path, load_accession_json, seeded_store, worker, StaticAccessionSource, LAB_PROVIDER_UUID};

#[tokio::test]
async fn first_delivery_creates_order_encounter_results_and_commits_once() {
    let acc = load_accession_json(fixture_path("accession_cbc_and_hb.json")).unwrap();
    let acc_uuid = acc.accession_uuid.clone();
    let store = Arc::new(seeded_store());
    let source = Arc::new(StaticAccessionSource::with(acc));
    let w = worker(source.clone(), store.clone());

    let out = w.process(&event_for("evt-1", &acc_uuid)).await.unwrap();

    assert_eq!(out.order_encounter, OrderEncounterChange::Created);
    assert!(out.committed);
    assert_eq!(store.visit_commits(), 1);
    assert_eq!(store.encounter_saves(), 1);
    assert_eq!(source.fetches(), 1);

    // hb, the cbc grouping and its two resulted members. plt has no result yet.
    assert_eq!(out.report.created_observations, 4);
    assert_eq!(out.report.pending, 1);
    assert_eq!(out.report.created_encounters.len(), 1);
    assert!(out.report.anomalies.is_empty());

    let visits = store.visits_for_patient("pat-0001");
    assert_eq!(visits.len(), 1);
    let visit = &visits[0];

    let order_enc = visit.encounter(&acc_uuid).expect("order encounter keyed by accession");
    let mut concepts: Vec<&str> = order_enc.orders.iter().map(|o| o.concept_uuid.as_str()).collect();
    concepts.sort();
    assert_eq!(concepts, vec!["cbc", "hb"]);

    let result_enc = visit.encounter(&out.report.created_encounters[0]).unwrap();
    assert_eq!(result_enc.provider_uuid(), Some(LAB_PROVIDER_UUID));
    assert_eq!(result_enc.encounter_type.name, "LAB_RESULT");

    let hb = visit.active_observations_for("hb");
    assert_eq!(hb.len(), 1);
    assert_eq!(hb[0].value, Some(ObsValue::Numeric(12.5)));
    let hb_order = order_enc.orders.iter().find(|o| o.concept_uuid == "hb").unwrap();
    assert_eq!(hb[0].order_uuid.as_deref(), Some(hb_order.uuid.as_str()));

    let groups = visit.active_observations_for("cbc");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].active_members().count(), 2);
}
