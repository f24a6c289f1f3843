use std::sync::Arc;

use labsync_reconcile::ReconcileAnomaly;
use labsync_runtime::OrderEncounterChange;
use labsync_testkit::{
    accession, at, by_provider, canceled, event_for, numeric, ordered, seeded_store, worker,
    StaticAccessionSource, LAB_PROVIDER_UUID, SYSTEM_PROVIDER_UUID,
};

#[tokio::test]
async fn unknown_and_blank_providers_share_the_system_result_encounter() {
    let acc = accession(
        "acc-1",
        "pat-1",
        vec![
            by_provider(numeric("hb", "12.5", at(10, 0)), Some("not-a-provider")),
            by_provider(numeric("glu", "5.2", at(10, 0)), None),
            numeric("na", "140", at(10, 5)),
        ],
    );
    let store = Arc::new(seeded_store());
    let w = worker(Arc::new(StaticAccessionSource::with(acc)), store.clone());

    let out = w.process(&event_for("evt-1", "acc-1")).await.unwrap();
    assert_eq!(out.report.created_encounters.len(), 2);

    let visit = &store.visits()[0];
    let owner_of = |concept: &str| {
        visit
            .encounters()
            .iter()
            .find(|e| e.observations.iter().any(|o| o.concept_uuid == concept))
            .and_then(|e| e.provider_uuid())
            .map(str::to_string)
    };
    assert_eq!(owner_of("hb").as_deref(), Some(SYSTEM_PROVIDER_UUID));
    assert_eq!(owner_of("glu").as_deref(), Some(SYSTEM_PROVIDER_UUID));
    assert_eq!(owner_of("na").as_deref(), Some(LAB_PROVIDER_UUID));
}

#[tokio::test]
async fn result_without_order_is_reported_and_skipped() {
    // Cancelled tests get no order, so a late result for one has nothing to attach to.
    let acc = accession(
        "acc-1",
        "pat-1",
        vec![
            numeric("hb", "12.5", at(10, 0)),
            canceled(numeric("glu", "5.2", at(10, 0))),
        ],
    );
    let store = Arc::new(seeded_store());
    let w = worker(Arc::new(StaticAccessionSource::with(acc)), store.clone());

    let out = w.process(&event_for("evt-1", "acc-1")).await.unwrap();

    assert!(out.committed);
    assert_eq!(out.report.created_observations, 1);
    assert_eq!(
        out.report.anomalies,
        vec![ReconcileAnomaly::MissingOrder {
            test_uuid: "glu".to_string(),
            orderable_uuid: "glu".to_string(),
        }]
    );
    assert!(store.visits()[0].active_observations_for("glu").is_empty());
}

#[tokio::test]
async fn changed_order_set_updates_the_existing_order_encounter() {
    let store = Arc::new(seeded_store());
    let source = Arc::new(StaticAccessionSource::with(accession(
        "acc-1",
        "pat-1",
        vec![ordered("hb"), ordered("glu")],
    )));
    let w = worker(source.clone(), store.clone());

    let first = w.process(&event_for("evt-1", "acc-1")).await.unwrap();
    assert_eq!(first.order_encounter, OrderEncounterChange::Created);
    assert!(!first.committed, "no results yet");
    assert_eq!(first.report.pending, 2);

    source.put(accession(
        "acc-1",
        "pat-1",
        vec![canceled(ordered("hb")), ordered("glu"), numeric("k", "4.0", at(11, 0))],
    ));
    let second = w.process(&event_for("evt-2", "acc-1")).await.unwrap();

    assert_eq!(second.order_encounter, OrderEncounterChange::Updated);
    assert_eq!(store.encounter_saves(), 2);
    assert_eq!(second.report.created_observations, 1);

    let visit = &store.visits()[0];
    let order_enc = visit.encounter("acc-1").unwrap();
    let active: Vec<&str> = order_enc.active_orders().map(|o| o.concept_uuid.as_str()).collect();
    assert!(active.contains(&"glu"));
    assert!(active.contains(&"k"));
    assert!(!active.contains(&"hb"));

    let k_order = order_enc.active_orders().find(|o| o.concept_uuid == "k").unwrap();
    let k_obs = visit.active_observations_for("k");
    assert_eq!(k_obs[0].order_uuid.as_deref(), Some(k_order.uuid.as_str()));
}

#[tokio::test]
async fn accessions_for_one_patient_share_the_visit() {
    let store = Arc::new(seeded_store());
    let source = Arc::new(StaticAccessionSource::new());
    source.put(accession("acc-1", "pat-1", vec![numeric("hb", "12.5", at(10, 0))]));
    source.put(accession("acc-2", "pat-1", vec![numeric("glu", "5.0", at(10, 30))]));
    let w = worker(source, store.clone());

    let a = w.process(&event_for("evt-1", "acc-1")).await.unwrap();
    let b = w.process(&event_for("evt-2", "acc-2")).await.unwrap();

    assert_eq!(a.visit_uuid, b.visit_uuid);
    assert!(b.report.created_encounters.is_empty(), "same provider, same result encounter");
    assert_eq!(store.visits_for_patient("pat-1").len(), 1);
}
