//! labsync-testkit
//!
//! In-memory collaborators and fixtures for driving the accession worker
//! without Postgres or a lab system.

mod source;
mod store;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use labsync_config::{
    ElisSettings, SyncConfig, DEFAULT_LAB_ORDER_ENCOUNTER_TYPE, DEFAULT_LAB_RESULT_ENCOUNTER_TYPE,
    DEFAULT_SYSTEM_PROVIDER_IDENTIFIER, DEFAULT_TIMEOUT_MS, DEFAULT_UNKNOWN_ENCOUNTER_ROLE_UUID,
};
use labsync_reconcile::{AccessionMapper, EncounterRole, EncounterType, Provider};
use labsync_runtime::{AccessionWorker, Dispatcher};
use labsync_schemas::{Accession, AccessionEvent, TestDetail};

pub use source::StaticAccessionSource;
pub use store::InMemoryStore;

pub const LAB_PROVIDER_UUID: &str = "prov-lab-1";
pub const SYSTEM_PROVIDER_UUID: &str = "prov-system";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Load an accession document in the lab system's JSON shape.
pub fn load_accession_json(path: impl AsRef<Path>) -> Result<Accession> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).with_context(|| format!("read fixture {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse fixture {}", path.display()))
}

pub fn fixture_path(name: &str) -> String {
    format!("{}/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Settings with every default and a fake lab system base uri.
pub fn default_settings() -> SyncConfig {
    SyncConfig {
        elis: ElisSettings {
            base_uri: "http://elis.test".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auth: None,
        },
        lab_result_encounter_type: DEFAULT_LAB_RESULT_ENCOUNTER_TYPE.to_string(),
        lab_order_encounter_type: DEFAULT_LAB_ORDER_ENCOUNTER_TYPE.to_string(),
        system_provider_identifier: DEFAULT_SYSTEM_PROVIDER_IDENTIFIER.to_string(),
        unknown_encounter_role_uuid: DEFAULT_UNKNOWN_ENCOUNTER_ROLE_UUID.to_string(),
        worker_concurrency: 4,
    }
}

/// Store holding both encounter types, the unknown role, the system
/// provider and one lab provider.
pub fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.add_encounter_type(EncounterType::new("type-result", DEFAULT_LAB_RESULT_ENCOUNTER_TYPE));
    store.add_encounter_type(EncounterType::new("type-order", DEFAULT_LAB_ORDER_ENCOUNTER_TYPE));
    store.add_role(EncounterRole::new(DEFAULT_UNKNOWN_ENCOUNTER_ROLE_UUID, "Unknown"));
    store.add_provider(Provider::new(SYSTEM_PROVIDER_UUID, DEFAULT_SYSTEM_PROVIDER_IDENTIFIER, "System"));
    store.add_provider(Provider::new(LAB_PROVIDER_UUID, "LAB01", "Lab Technician"));
    store
}

pub fn worker(source: Arc<StaticAccessionSource>, store: Arc<InMemoryStore>) -> AccessionWorker {
    AccessionWorker::new(source, store, Arc::new(AccessionMapper), default_settings())
}

pub fn dispatcher(
    source: Arc<StaticAccessionSource>,
    store: Arc<InMemoryStore>,
    concurrency: usize,
) -> Dispatcher {
    Dispatcher::new(Arc::new(worker(source, store)), concurrency)
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn event_for(event_id: &str, accession_uuid: &str) -> AccessionEvent {
    AccessionEvent::new(event_id, format!("/ws/rest/accession/{accession_uuid}"))
}

pub fn accession(uuid: &str, patient: &str, details: Vec<TestDetail>) -> Accession {
    Accession {
        accession_uuid: uuid.to_string(),
        patient_uuid: patient.to_string(),
        date_time: at(8, 0),
        test_details: details,
    }
}

/// Standalone test, no result yet.
pub fn ordered(test: &str) -> TestDetail {
    TestDetail {
        test_uuid: test.to_string(),
        panel_uuid: None,
        test_name: None,
        result: None,
        result_type: None,
        test_unit_of_measurement: None,
        abnormal: None,
        provider_uuid: None,
        date_time: None,
        status: None,
    }
}

/// Numeric result reported by the lab provider.
pub fn numeric(test: &str, value: &str, reported: DateTime<Utc>) -> TestDetail {
    TestDetail {
        result: Some(value.to_string()),
        result_type: Some("N".to_string()),
        provider_uuid: Some(LAB_PROVIDER_UUID.to_string()),
        date_time: Some(reported),
        ..ordered(test)
    }
}

pub fn in_panel(mut detail: TestDetail, panel: &str) -> TestDetail {
    detail.panel_uuid = Some(panel.to_string());
    detail
}

pub fn by_provider(mut detail: TestDetail, provider: Option<&str>) -> TestDetail {
    detail.provider_uuid = provider.map(str::to_string);
    detail
}

pub fn canceled(mut detail: TestDetail) -> TestDetail {
    detail.status = Some(labsync_schemas::STATUS_CANCELED.to_string());
    detail
}
