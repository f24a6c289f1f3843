use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fresh stable identifier for locally created records.
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncounterType {
    pub uuid: String,
    pub name: String,
}

impl EncounterType {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncounterRole {
    pub uuid: String,
    pub name: String,
}

impl EncounterRole {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
        }
    }
}

/// Local provider record. `uuid` is the identity shared with the lab system;
/// `identifier` is the local short code (the fallback provider is `system`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provider {
    pub uuid: String,
    pub identifier: String,
    pub name: String,
}

impl Provider {
    pub fn new(
        uuid: impl Into<String>,
        identifier: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            identifier: identifier.into(),
            name: name.into(),
        }
    }
}

/// A standing request for a test or panel. Created by the encounter mapper,
/// only ever looked up by the reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub uuid: String,
    pub concept_uuid: String,
    pub voided: bool,
}

impl Order {
    pub fn new(uuid: impl Into<String>, concept_uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            concept_uuid: concept_uuid.into(),
            voided: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObsValue {
    Numeric(f64),
    Text(String),
}

/// A recorded value for one concept. Panel groupings carry no value and own
/// their member observations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub uuid: String,
    pub concept_uuid: String,
    pub obs_datetime: DateTime<Utc>,
    pub value: Option<ObsValue>,
    pub order_uuid: Option<String>,
    pub abnormal: Option<bool>,
    pub voided: bool,
    pub void_reason: Option<String>,
    pub group_members: Vec<Observation>,
}

impl Observation {
    pub fn new(concept_uuid: impl Into<String>, obs_datetime: DateTime<Utc>) -> Self {
        Self {
            uuid: new_uuid(),
            concept_uuid: concept_uuid.into(),
            obs_datetime,
            value: None,
            order_uuid: None,
            abnormal: None,
            voided: false,
            void_reason: None,
            group_members: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: ObsValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_order(mut self, order_uuid: impl Into<String>) -> Self {
        self.order_uuid = Some(order_uuid.into());
        self
    }

    pub fn with_abnormal(mut self, abnormal: Option<bool>) -> Self {
        self.abnormal = abnormal;
        self
    }

    pub fn with_member(mut self, member: Observation) -> Self {
        self.group_members.push(member);
        self
    }

    pub fn active_members(&self) -> impl Iterator<Item = &Observation> {
        self.group_members.iter().filter(|m| !m.voided)
    }

    /// Logical delete. The record stays for audit.
    pub fn void(&mut self, reason: &str) {
        self.voided = true;
        self.void_reason = Some(reason.to_string());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterProvider {
    pub provider: Provider,
    pub role: EncounterRole,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub uuid: String,
    /// Back-reference by identifier only; the visit owns the encounter.
    pub visit_uuid: String,
    pub patient_uuid: String,
    pub encounter_type: EncounterType,
    pub encounter_datetime: DateTime<Utc>,
    pub provider: Option<EncounterProvider>,
    pub observations: Vec<Observation>,
    pub orders: Vec<Order>,
    pub voided: bool,
}

impl Encounter {
    pub fn new(
        uuid: impl Into<String>,
        visit_uuid: impl Into<String>,
        patient_uuid: impl Into<String>,
        encounter_type: EncounterType,
        encounter_datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            visit_uuid: visit_uuid.into(),
            patient_uuid: patient_uuid.into(),
            encounter_type,
            encounter_datetime,
            provider: None,
            observations: Vec::new(),
            orders: Vec::new(),
            voided: false,
        }
    }

    pub fn with_provider(mut self, provider: Provider, role: EncounterRole) -> Self {
        self.provider = Some(EncounterProvider { provider, role });
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn with_obs(mut self, obs: Observation) -> Self {
        self.observations.push(obs);
        self
    }

    pub fn provider_uuid(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.provider.uuid.as_str())
    }

    pub fn is_of_type(&self, encounter_type: &EncounterType) -> bool {
        self.encounter_type.uuid == encounter_type.uuid
    }

    pub fn active_top_level_obs(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(|o| !o.voided)
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| !o.voided)
    }

    pub fn add_obs(&mut self, obs: Observation) {
        self.observations.push(obs);
    }
}

/// Position of an observation inside a visit: encounter, top-level index and
/// (for panel members) the member index inside the grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObsLocation {
    pub encounter_uuid: String,
    pub top: usize,
    pub member: Option<usize>,
}

/// Episode-of-care aggregate. Encounters are owned by value and addressed by
/// their uuid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub uuid: String,
    pub patient_uuid: String,
    pub started_at: DateTime<Utc>,
    encounters: Vec<Encounter>,
}

impl Visit {
    pub fn new(
        uuid: impl Into<String>,
        patient_uuid: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            patient_uuid: patient_uuid.into(),
            started_at,
            encounters: Vec::new(),
        }
    }

    pub fn encounters(&self) -> &[Encounter] {
        &self.encounters
    }

    pub fn encounter(&self, uuid: &str) -> Option<&Encounter> {
        self.encounters.iter().find(|e| e.uuid == uuid)
    }

    pub fn encounter_mut(&mut self, uuid: &str) -> Option<&mut Encounter> {
        self.encounters.iter_mut().find(|e| e.uuid == uuid)
    }

    /// Attach an encounter, taking ownership. An encounter with the same uuid
    /// is replaced in place so re-attaching never duplicates.
    pub fn add_encounter(&mut self, mut encounter: Encounter) {
        encounter.visit_uuid = self.uuid.clone();
        match self.encounters.iter_mut().find(|e| e.uuid == encounter.uuid) {
            Some(slot) => *slot = encounter,
            None => self.encounters.push(encounter),
        }
    }

    /// First encounter satisfying `matches`, or a freshly created one
    /// attached to this visit. The flag reports whether it was created.
    pub fn find_or_add_encounter(
        &mut self,
        matches: impl Fn(&Encounter) -> bool,
        create: impl FnOnce() -> Encounter,
    ) -> (&mut Encounter, bool) {
        if let Some(i) = self.encounters.iter().position(|e| matches(e)) {
            return (&mut self.encounters[i], false);
        }
        let mut encounter = create();
        encounter.visit_uuid = self.uuid.clone();
        self.encounters.push(encounter);
        let last = self.encounters.len() - 1;
        (&mut self.encounters[last], true)
    }

    pub fn observation_at(&self, loc: &ObsLocation) -> Option<&Observation> {
        let top = self.encounter(&loc.encounter_uuid)?.observations.get(loc.top)?;
        match loc.member {
            Some(m) => top.group_members.get(m),
            None => Some(top),
        }
    }

    pub fn observation_at_mut(&mut self, loc: &ObsLocation) -> Option<&mut Observation> {
        let top = self
            .encounter_mut(&loc.encounter_uuid)?
            .observations
            .get_mut(loc.top)?;
        match loc.member {
            Some(m) => top.group_members.get_mut(m),
            None => Some(top),
        }
    }

    /// Every observation of the visit, groupings and members alike.
    pub fn all_observations(&self) -> Vec<&Observation> {
        let mut out = Vec::new();
        for e in &self.encounters {
            for o in &e.observations {
                out.push(o);
                out.extend(o.group_members.iter());
            }
        }
        out
    }

    /// Non-voided observations for `concept_uuid` anywhere in the visit.
    pub fn active_observations_for(&self, concept_uuid: &str) -> Vec<&Observation> {
        self.all_observations()
            .into_iter()
            .filter(|o| !o.voided && o.concept_uuid == concept_uuid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn add_encounter_rebinds_visit_and_replaces_same_uuid() {
        let mut visit = Visit::new("v1", "p1", ts());
        let ty = EncounterType::new("t1", "LAB_RESULT");

        visit.add_encounter(Encounter::new("e1", "other-visit", "p1", ty.clone(), ts()));
        assert_eq!(visit.encounters()[0].visit_uuid, "v1");

        let replacement = Encounter::new("e1", "v1", "p1", ty, ts())
            .with_obs(Observation::new("hb", ts()));
        visit.add_encounter(replacement);

        assert_eq!(visit.encounters().len(), 1);
        assert_eq!(visit.encounters()[0].observations.len(), 1);
    }

    #[test]
    fn locations_address_members_inside_groups() {
        let mut visit = Visit::new("v1", "p1", ts());
        let group = Observation::new("cbc", ts())
            .with_member(Observation::new("wbc", ts()))
            .with_member(Observation::new("rbc", ts()));
        visit.add_encounter(
            Encounter::new("e1", "v1", "p1", EncounterType::new("t1", "LAB_RESULT"), ts())
                .with_obs(group),
        );

        let loc = ObsLocation {
            encounter_uuid: "e1".to_string(),
            top: 0,
            member: Some(1),
        };
        assert_eq!(visit.observation_at(&loc).unwrap().concept_uuid, "rbc");

        visit.observation_at_mut(&loc).unwrap().void("test");
        assert!(visit.active_observations_for("rbc").is_empty());
        assert_eq!(visit.active_observations_for("wbc").len(), 1);
        assert_eq!(visit.all_observations().len(), 3);
    }
}
