use std::sync::Arc;

use labsync_reconcile::{ObsValue, VOID_REASON_UPDATED};
use labsync_runtime::OrderEncounterChange;
use labsync_testkit::{
    accession, at, event_for, in_panel, numeric, seeded_store, worker, StaticAccessionSource,
};

#[tokio::test]
async fn redelivering_an_unchanged_accession_commits_nothing() {
    let acc = accession("acc-1", "pat-1", vec![numeric("hb", "12.5", at(10, 0))]);
    let store = Arc::new(seeded_store());
    let source = Arc::new(StaticAccessionSource::with(acc));
    let w = worker(source, store.clone());

    w.process(&event_for("evt-1", "acc-1")).await.unwrap();
    let before = store.visits();

    let again = w.process(&event_for("evt-2", "acc-1")).await.unwrap();

    assert_eq!(again.order_encounter, OrderEncounterChange::Unchanged);
    assert!(!again.committed);
    assert_eq!(again.report.unchanged, 1);
    assert_eq!(store.visit_commits(), 1);
    assert_eq!(store.encounter_saves(), 1);
    assert_eq!(store.visits(), before);
}

#[tokio::test]
async fn corrected_result_voids_the_old_observation_and_creates_one_new() {
    let store = Arc::new(seeded_store());
    let source = Arc::new(StaticAccessionSource::with(accession(
        "acc-1",
        "pat-1",
        vec![numeric("hb", "12.5", at(10, 0))],
    )));
    let w = worker(source.clone(), store.clone());
    w.process(&event_for("evt-1", "acc-1")).await.unwrap();

    source.put(accession("acc-1", "pat-1", vec![numeric("hb", "13.1", at(11, 30))]));
    let out = w.process(&event_for("evt-2", "acc-1")).await.unwrap();

    assert!(out.committed);
    assert_eq!(out.report.voided_observations, 1);
    assert_eq!(out.report.created_observations, 1);
    assert!(out.report.created_encounters.is_empty(), "same provider reuses its result encounter");

    let visit = &store.visits()[0];
    let all_hb: Vec<_> = visit
        .all_observations()
        .into_iter()
        .filter(|o| o.concept_uuid == "hb")
        .collect();
    assert_eq!(all_hb.len(), 2);
    let live: Vec<_> = all_hb.iter().filter(|o| !o.voided).collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].value, Some(ObsValue::Numeric(13.1)));
    let dead = all_hb.iter().find(|o| o.voided).unwrap();
    assert_eq!(dead.void_reason.as_deref(), Some(VOID_REASON_UPDATED));

    // A third delivery of the corrected document is a no-op.
    let third = w.process(&event_for("evt-3", "acc-1")).await.unwrap();
    assert!(!third.committed);
    assert_eq!(store.visit_commits(), 2);
}

#[tokio::test]
async fn panel_member_correction_keeps_a_single_live_grouping() {
    let store = Arc::new(seeded_store());
    let source = Arc::new(StaticAccessionSource::with(accession(
        "acc-1",
        "pat-1",
        vec![in_panel(numeric("wbc", "4.1", at(10, 0)), "cbc")],
    )));
    let w = worker(source.clone(), store.clone());
    w.process(&event_for("evt-1", "acc-1")).await.unwrap();

    source.put(accession(
        "acc-1",
        "pat-1",
        vec![in_panel(numeric("wbc", "4.4", at(12, 0)), "cbc")],
    ));
    let out = w.process(&event_for("evt-2", "acc-1")).await.unwrap();

    // Old member plus its emptied grouping, then a fresh grouping and member.
    assert_eq!(out.report.voided_observations, 2);
    assert_eq!(out.report.created_observations, 2);

    let visit = &store.visits()[0];
    let groups = visit.active_observations_for("cbc");
    assert_eq!(groups.len(), 1);
    let members: Vec<_> = groups[0].active_members().collect();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].value, Some(ObsValue::Numeric(4.4)));
}
