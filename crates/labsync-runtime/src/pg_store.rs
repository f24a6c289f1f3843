use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labsync_reconcile::{Encounter, EncounterRole, EncounterType, Provider, Visit};
use sqlx::PgPool;

use crate::ports::ClinicalStore;

/// [`ClinicalStore`] over the Postgres schema in `labsync-db`.
#[derive(Clone)]
pub struct PgClinicalStore {
    pool: PgPool,
}

impl PgClinicalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClinicalStore for PgClinicalStore {
    async fn find_encounter(&self, uuid: &str) -> Result<Option<Encounter>> {
        labsync_db::find_encounter(&self.pool, uuid).await
    }

    async fn find_or_open_visit(&self, patient_uuid: &str, at: DateTime<Utc>) -> Result<Visit> {
        labsync_db::find_or_open_visit(&self.pool, patient_uuid, at).await
    }

    async fn save_encounter_transaction(&self, encounter: &Encounter) -> Result<()> {
        labsync_db::save_encounter_transaction(&self.pool, encounter).await
    }

    async fn load_visit(&self, uuid: &str) -> Result<Option<Visit>> {
        labsync_db::load_visit(&self.pool, uuid).await
    }

    async fn save_visit(&self, visit: &Visit) -> Result<()> {
        labsync_db::save_visit(&self.pool, visit).await
    }

    async fn encounter_type_by_name(&self, name: &str) -> Result<Option<EncounterType>> {
        labsync_db::encounter_type_by_name(&self.pool, name).await
    }

    async fn encounter_role_by_uuid(&self, uuid: &str) -> Result<Option<EncounterRole>> {
        labsync_db::encounter_role_by_uuid(&self.pool, uuid).await
    }

    async fn provider_by_uuid(&self, uuid: &str) -> Result<Option<Provider>> {
        labsync_db::provider_by_uuid(&self.pool, uuid).await
    }

    async fn provider_by_identifier(&self, identifier: &str) -> Result<Option<Provider>> {
        labsync_db::provider_by_identifier(&self.pool, identifier).await
    }

    async fn providers_by_uuids(&self, uuids: &[String]) -> Result<Vec<Provider>> {
        labsync_db::providers_by_uuids(&self.pool, uuids).await
    }
}
