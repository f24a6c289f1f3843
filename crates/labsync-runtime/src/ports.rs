//! Seams between the worker and the outside world.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labsync_reconcile::{Encounter, EncounterRole, EncounterType, Provider, Visit};
use labsync_schemas::{Accession, AccessionEvent};

/// Fetches the accession document an event points at.
#[async_trait]
pub trait AccessionSource: Send + Sync {
    async fn fetch(&self, event: &AccessionEvent) -> Result<Accession>;
}

/// Clinical record store: reference lookups plus the visit graph.
#[async_trait]
pub trait ClinicalStore: Send + Sync {
    async fn find_encounter(&self, uuid: &str) -> Result<Option<Encounter>>;

    async fn find_or_open_visit(&self, patient_uuid: &str, at: DateTime<Utc>) -> Result<Visit>;

    async fn save_encounter_transaction(&self, encounter: &Encounter) -> Result<()>;

    async fn load_visit(&self, uuid: &str) -> Result<Option<Visit>>;

    /// Commit boundary: every mutation of the visit, atomically.
    async fn save_visit(&self, visit: &Visit) -> Result<()>;

    async fn encounter_type_by_name(&self, name: &str) -> Result<Option<EncounterType>>;

    async fn encounter_role_by_uuid(&self, uuid: &str) -> Result<Option<EncounterRole>>;

    async fn provider_by_uuid(&self, uuid: &str) -> Result<Option<Provider>>;

    async fn provider_by_identifier(&self, identifier: &str) -> Result<Option<Provider>>;

    /// Known providers among `uuids`; unknown ids are simply absent.
    async fn providers_by_uuids(&self, uuids: &[String]) -> Result<Vec<Provider>> {
        let mut out = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            if let Some(p) = self.provider_by_uuid(uuid).await? {
                out.push(p);
            }
        }
        Ok(out)
    }
}
