use std::sync::Arc;

use labsync_reconcile::{EncounterRole, EncounterType, Provider};
use labsync_testkit::{
    accession, at, event_for, numeric, seeded_store, worker, InMemoryStore, StaticAccessionSource,
};

#[tokio::test]
async fn invalid_numeric_result_aborts_before_any_write() {
    let acc = accession(
        "acc-1",
        "pat-1",
        vec![numeric("hb", "12.5", at(10, 0)), numeric("glu", "high", at(10, 0))],
    );
    let store = Arc::new(seeded_store());
    let w = worker(Arc::new(StaticAccessionSource::with(acc)), store.clone());

    let err = w.process(&event_for("evt-1", "acc-1")).await.unwrap_err();

    assert_eq!(err.class(), "INVALID_ACCESSION");
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("glu"));
    assert_eq!(store.encounter_saves(), 0);
    assert_eq!(store.visit_commits(), 0);
    assert!(store.visits().is_empty());
}

#[tokio::test]
async fn fetch_failure_is_retryable() {
    let store = Arc::new(seeded_store());
    let w = worker(Arc::new(StaticAccessionSource::new()), store.clone());

    let err = w.process(&event_for("evt-1", "missing")).await.unwrap_err();
    assert_eq!(err.class(), "FETCH");
    assert!(err.is_retryable());
    assert!(store.visits().is_empty());
}

#[tokio::test]
async fn failed_commit_persists_no_results_and_retry_recovers() {
    let acc = accession("acc-1", "pat-1", vec![numeric("hb", "12.5", at(10, 0))]);
    let store = Arc::new(seeded_store());
    let w = worker(Arc::new(StaticAccessionSource::with(acc)), store.clone());

    store.fail_next_visit_save();
    let err = w.process(&event_for("evt-1", "acc-1")).await.unwrap_err();
    assert_eq!(err.class(), "PERSISTENCE");
    assert!(err.is_retryable());
    assert!(store.visits()[0].active_observations_for("hb").is_empty());

    let out = w.process(&event_for("evt-1", "acc-1")).await.unwrap();
    assert!(out.committed);
    assert_eq!(store.visit_commits(), 1);
    assert_eq!(store.visits()[0].active_observations_for("hb").len(), 1);
}

fn store_without(skip_result_type: bool, skip_system_provider: bool) -> InMemoryStore {
    let store = InMemoryStore::new();
    if !skip_result_type {
        store.add_encounter_type(EncounterType::new("type-result", "LAB_RESULT"));
    }
    store.add_encounter_type(EncounterType::new("type-order", "INVESTIGATION"));
    store.add_role(EncounterRole::new("a0b03050-c99b-11e0-9572-0800200c9a66", "Unknown"));
    if !skip_system_provider {
        store.add_provider(Provider::new("prov-system", "system", "System"));
    }
    store
}

#[tokio::test]
async fn missing_result_encounter_type_is_a_configuration_error() {
    let acc = accession("acc-1", "pat-1", vec![numeric("hb", "12.5", at(10, 0))]);
    let store = Arc::new(store_without(true, false));
    let w = worker(Arc::new(StaticAccessionSource::with(acc)), store.clone());

    let err = w.process(&event_for("evt-1", "acc-1")).await.unwrap_err();
    assert_eq!(err.class(), "CONFIGURATION");
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("LAB_RESULT"));
    assert!(store.visits().is_empty());
}

#[tokio::test]
async fn missing_fallback_provider_is_a_configuration_error() {
    let acc = accession("acc-1", "pat-1", vec![numeric("hb", "12.5", at(10, 0))]);
    let store = Arc::new(store_without(false, true));
    let w = worker(Arc::new(StaticAccessionSource::with(acc)), store.clone());

    let err = w.process(&event_for("evt-1", "acc-1")).await.unwrap_err();
    assert_eq!(err.class(), "CONFIGURATION");
    assert!(err.to_string().contains("system"));
    assert_eq!(store.encounter_saves(), 0);
}
