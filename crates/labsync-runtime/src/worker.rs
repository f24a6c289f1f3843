use std::sync::Arc;

use labsync_config::SyncConfig;
use labsync_reconcile::{
    diff, reconcile_results, validate_results, EncounterMapper, EncounterRole, EncounterType,
    MapContext, ProviderDirectory, ReconcileContext, ReconcileReport, StaticProviderDirectory,
    Visit,
};
use labsync_schemas::{Accession, AccessionEvent};
use serde::Serialize;

use crate::error::FeedError;
use crate::ports::{AccessionSource, ClinicalStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEncounterChange {
    Created,
    Updated,
    Unchanged,
}

/// Result of one successfully processed notification.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub event_id: String,
    pub accession_uuid: String,
    pub visit_uuid: String,
    pub order_encounter: OrderEncounterChange,
    pub report: ReconcileReport,
    /// False when the pass had nothing to write.
    pub committed: bool,
}

/// Reference data one pass needs, loaded before the pure core runs.
struct PassReferences {
    result_type: EncounterType,
    unknown_role: EncounterRole,
    providers: StaticProviderDirectory,
}

/// Processes one accession notification end to end.
///
/// Wiring is explicit: source, store and mapper are handed in; the worker
/// never looks anything up by type at runtime.
pub struct AccessionWorker {
    source: Arc<dyn AccessionSource>,
    store: Arc<dyn ClinicalStore>,
    mapper: Arc<dyn EncounterMapper>,
    settings: SyncConfig,
}

impl AccessionWorker {
    pub fn new(
        source: Arc<dyn AccessionSource>,
        store: Arc<dyn ClinicalStore>,
        mapper: Arc<dyn EncounterMapper>,
        settings: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            mapper,
            settings,
        }
    }

    pub fn settings(&self) -> &SyncConfig {
        &self.settings
    }

    pub async fn process(&self, event: &AccessionEvent) -> Result<ProcessOutcome, FeedError> {
        let url = self.settings.accession_url(&event.content);
        tracing::info!(event_id = %event.event_id, url = %url, "processing accession event");

        let result = self.process_inner(event).await;
        if let Err(err) = &result {
            tracing::error!(
                event_id = %event.event_id,
                class = err.class(),
                retryable = err.is_retryable(),
                error = %err,
                "accession event failed"
            );
        }
        result
    }

    async fn process_inner(&self, event: &AccessionEvent) -> Result<ProcessOutcome, FeedError> {
        let accession = self.source.fetch(event).await.map_err(FeedError::fetch)?;

        // Nothing is written for a document that cannot be reconciled.
        validate_results(&accession)?;
        let refs = self.load_references(&accession).await?;

        let (order_encounter_uuid, visit_uuid, change) = self.upsert_order_encounter(&accession, &refs).await?;

        let mut visit = self
            .store
            .load_visit(&visit_uuid)
            .await
            .map_err(FeedError::persistence)?
            .ok_or_else(|| FeedError::Integrity(format!("visit {visit_uuid} missing after order save")))?;

        let report = self.reconcile(&mut visit, &order_encounter_uuid, &accession, &refs)?;

        let committed = report.has_mutations();
        if committed {
            self.store
                .save_visit(&visit)
                .await
                .map_err(FeedError::persistence)?;
        }

        tracing::info!(
            accession = %accession.accession_uuid,
            created = report.created_observations,
            voided = report.voided_observations,
            unchanged = report.unchanged,
            anomalies = report.anomalies.len(),
            committed,
            "accession reconciled"
        );

        Ok(ProcessOutcome {
            event_id: event.event_id.clone(),
            accession_uuid: accession.accession_uuid.clone(),
            visit_uuid: visit.uuid.clone(),
            order_encounter: change,
            report,
            committed,
        })
    }

    async fn load_references(&self, accession: &Accession) -> Result<PassReferences, FeedError> {
        let type_name = &self.settings.lab_result_encounter_type;
        let result_type = self
            .store
            .encounter_type_by_name(type_name)
            .await
            .map_err(FeedError::persistence)?
            .ok_or_else(|| FeedError::Configuration(format!("encounter type '{type_name}' not found")))?;

        let role_uuid = &self.settings.unknown_encounter_role_uuid;
        let unknown_role = self
            .store
            .encounter_role_by_uuid(role_uuid)
            .await
            .map_err(FeedError::persistence)?
            .ok_or_else(|| FeedError::Configuration(format!("encounter role {role_uuid} not found")))?;

        // Preload every provider the pass can touch so the core stays in memory.
        let mut providers = StaticProviderDirectory::default();
        let referenced: Vec<String> = accession.provider_uuids().into_iter().map(str::to_string).collect();
        if !referenced.is_empty() {
            for p in self
                .store
                .providers_by_uuids(&referenced)
                .await
                .map_err(FeedError::persistence)?
            {
                providers.insert(p);
            }
        }
        if let Some(p) = self
            .store
            .provider_by_identifier(&self.settings.system_provider_identifier)
            .await
            .map_err(FeedError::persistence)?
        {
            providers.insert(p);
        }

        Ok(PassReferences {
            result_type,
            unknown_role,
            providers,
        })
    }

    /// Create or update the order encounter for the accession. Returns its
    /// uuid, the owning visit and what happened to it.
    async fn upsert_order_encounter(
        &self,
        accession: &Accession,
        refs: &PassReferences,
    ) -> Result<(String, String, OrderEncounterChange), FeedError> {
        let prior = self
            .store
            .find_encounter(&accession.accession_uuid)
            .await
            .map_err(FeedError::persistence)?;

        if let Some(prior) = prior {
            let change_set = diff(accession, &prior);
            if !change_set.has_difference() {
                return Ok((prior.uuid, prior.visit_uuid, OrderEncounterChange::Unchanged));
            }
            let updated = self.mapper.map_to_existing(accession, &change_set, &prior);
            self.store
                .save_encounter_transaction(&updated)
                .await
                .map_err(FeedError::persistence)?;
            tracing::info!(
                accession = %accession.accession_uuid,
                added = change_set.added.len(),
                removed = change_set.removed.len(),
                "order encounter updated"
            );
            return Ok((updated.uuid, updated.visit_uuid, OrderEncounterChange::Updated));
        }

        let order_type_name = &self.settings.lab_order_encounter_type;
        let order_type = self
            .store
            .encounter_type_by_name(order_type_name)
            .await
            .map_err(FeedError::persistence)?
            .ok_or_else(|| FeedError::Configuration(format!("encounter type '{order_type_name}' not found")))?;
        let fallback = &self.settings.system_provider_identifier;
        let provider = refs
            .providers
            .by_identifier(fallback)
            .ok_or_else(|| FeedError::Configuration(format!("fallback provider '{fallback}' not found")))?;

        let visit: Visit = self
            .store
            .find_or_open_visit(&accession.patient_uuid, accession.effective_date())
            .await
            .map_err(FeedError::persistence)?;

        let ctx = MapContext {
            order_encounter_type: order_type,
            provider,
            role: refs.unknown_role.clone(),
        };
        let created = self.mapper.map_to_new(accession, &visit, &ctx);
        self.store
            .save_encounter_transaction(&created)
            .await
            .map_err(FeedError::persistence)?;
        tracing::info!(
            accession = %accession.accession_uuid,
            visit = %visit.uuid,
            orders = created.orders.len(),
            "order encounter created"
        );
        Ok((created.uuid, visit.uuid, OrderEncounterChange::Created))
    }

    fn reconcile(
        &self,
        visit: &mut Visit,
        order_encounter_uuid: &str,
        accession: &Accession,
        refs: &PassReferences,
    ) -> Result<ReconcileReport, FeedError> {
        let ctx = ReconcileContext {
            result_encounter_type: &refs.result_type,
            unknown_role: &refs.unknown_role,
            providers: &refs.providers,
            fallback_provider_identifier: &self.settings.system_provider_identifier,
        };
        Ok(reconcile_results(visit, order_encounter_uuid, accession, &ctx)?)
    }
}
