use std::sync::Arc;

use labsync_testkit::{accession, at, dispatcher, event_for, numeric, seeded_store, StaticAccessionSource};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_of_one_accession_apply_once() {
    let store = Arc::new(seeded_store());
    let source = Arc::new(StaticAccessionSource::with(accession(
        "acc-1",
        "pat-1",
        vec![numeric("hb", "12.5", at(10, 0))],
    )));
    let d = dispatcher(source.clone(), store.clone(), 4);

    let events = (0..8).map(|i| event_for(&format!("evt-{i}"), "acc-1")).collect();
    let results = d.dispatch_all(events).await;

    assert_eq!(results.len(), 8);
    let committed = results
        .iter()
        .map(|r| r.as_ref().expect("every delivery succeeds"))
        .filter(|o| o.committed)
        .count();
    assert_eq!(committed, 1);
    assert_eq!(store.visit_commits(), 1);
    assert_eq!(store.encounter_saves(), 1);
    assert_eq!(store.visits().len(), 1);
    assert_eq!(store.visits()[0].active_observations_for("hb").len(), 1);
    assert_eq!(source.fetches(), 8);
    assert_eq!(d.tracked_keys(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_accessions_all_complete_in_input_order() {
    let store = Arc::new(seeded_store());
    let source = Arc::new(StaticAccessionSource::new());
    for i in 0..6 {
        source.put(accession(
            &format!("acc-{i}"),
            &format!("pat-{i}"),
            vec![numeric("hb", "12.5", at(10, i))],
        ));
    }
    let d = dispatcher(source, store.clone(), 2);

    let events = (0..6).map(|i| event_for(&format!("evt-{i}"), &format!("acc-{i}"))).collect();
    let results = d.dispatch_all(events).await;

    for (i, r) in results.iter().enumerate() {
        let out = r.as_ref().unwrap();
        assert_eq!(out.accession_uuid, format!("acc-{i}"));
        assert_eq!(out.event_id, format!("evt-{i}"));
    }
    assert_eq!(store.visits().len(), 6);
    assert_eq!(store.visit_commits(), 6);
    assert_eq!(d.tracked_keys(), 0);
}
