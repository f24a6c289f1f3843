use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labsync_reconcile::{new_uuid, Encounter, EncounterRole, EncounterType, Provider, Visit};
use labsync_runtime::ClinicalStore;

#[derive(Default)]
struct State {
    visits: BTreeMap<String, Visit>,
    encounter_types: Vec<EncounterType>,
    roles: Vec<EncounterRole>,
    providers: Vec<Provider>,
    visit_commits: usize,
    encounter_saves: usize,
    fail_next_visit_save: bool,
}

/// In-memory [`ClinicalStore`]. Saves copy the graph, loads hand out copies,
/// so callers can never mutate durable state without a save.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_encounter_type(&self, t: EncounterType) {
        self.state().encounter_types.push(t);
    }

    pub fn add_role(&self, r: EncounterRole) {
        self.state().roles.push(r);
    }

    pub fn add_provider(&self, p: Provider) {
        self.state().providers.push(p);
    }

    /// Number of successful `save_visit` calls.
    pub fn visit_commits(&self) -> usize {
        self.state().visit_commits
    }

    pub fn encounter_saves(&self) -> usize {
        self.state().encounter_saves
    }

    /// Make the next `save_visit` fail without persisting anything.
    pub fn fail_next_visit_save(&self) {
        self.state().fail_next_visit_save = true;
    }

    pub fn visits(&self) -> Vec<Visit> {
        self.state().visits.values().cloned().collect()
    }

    pub fn visits_for_patient(&self, patient_uuid: &str) -> Vec<Visit> {
        self.state()
            .visits
            .values()
            .filter(|v| v.patient_uuid == patient_uuid)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ClinicalStore for InMemoryStore {
    async fn find_encounter(&self, uuid: &str) -> Result<Option<Encounter>> {
        Ok(self
            .state()
            .visits
            .values()
            .find_map(|v| v.encounter(uuid).cloned()))
    }

    async fn find_or_open_visit(&self, patient_uuid: &str, at: DateTime<Utc>) -> Result<Visit> {
        let mut st = self.state();
        if let Some(v) = st.visits.values().find(|v| v.patient_uuid == patient_uuid) {
            return Ok(v.clone());
        }
        let visit = Visit::new(new_uuid(), patient_uuid, at);
        st.visits.insert(visit.uuid.clone(), visit.clone());
        Ok(visit)
    }

    async fn save_encounter_transaction(&self, encounter: &Encounter) -> Result<()> {
        let mut st = self.state();
        let visit = st
            .visits
            .get_mut(&encounter.visit_uuid)
            .ok_or_else(|| anyhow!("visit {} not found for encounter {}", encounter.visit_uuid, encounter.uuid))?;
        visit.add_encounter(encounter.clone());
        st.encounter_saves += 1;
        Ok(())
    }

    async fn load_visit(&self, uuid: &str) -> Result<Option<Visit>> {
        Ok(self.state().visits.get(uuid).cloned())
    }

    async fn save_visit(&self, visit: &Visit) -> Result<()> {
        tokio::task::yield_now().await;
        let mut st = self.state();
        if st.fail_next_visit_save {
            st.fail_next_visit_save = false;
            bail!("injected save_visit failure");
        }
        st.visits.insert(visit.uuid.clone(), visit.clone());
        st.visit_commits += 1;
        Ok(())
    }

    async fn encounter_type_by_name(&self, name: &str) -> Result<Option<EncounterType>> {
        Ok(self.state().encounter_types.iter().find(|t| t.name == name).cloned())
    }

    async fn encounter_role_by_uuid(&self, uuid: &str) -> Result<Option<EncounterRole>> {
        Ok(self.state().roles.iter().find(|r| r.uuid == uuid).cloned())
    }

    async fn provider_by_uuid(&self, uuid: &str) -> Result<Option<Provider>> {
        Ok(self.state().providers.iter().find(|p| p.uuid == uuid).cloned())
    }

    async fn provider_by_identifier(&self, identifier: &str) -> Result<Option<Provider>> {
        Ok(self
            .state()
            .providers
            .iter()
            .find(|p| p.identifier == identifier)
            .cloned())
    }
}
