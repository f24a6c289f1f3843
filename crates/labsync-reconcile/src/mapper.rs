use labsync_schemas::Accession;

use crate::diff::ChangeSet;
use crate::types::{new_uuid, Encounter, EncounterRole, EncounterType, Order, Provider, Visit};

/// What a new order encounter is stamped with.
#[derive(Clone, Debug)]
pub struct MapContext {
    pub order_encounter_type: EncounterType,
    pub provider: Provider,
    pub role: EncounterRole,
}

/// Turns an accession into the order encounter handed to the
/// encounter-transaction save. Results are never mapped here.
pub trait EncounterMapper: Send + Sync {
    fn map_to_new(&self, accession: &Accession, visit: &Visit, ctx: &MapContext) -> Encounter;

    fn map_to_existing(
        &self,
        accession: &Accession,
        change_set: &ChangeSet,
        prior: &Encounter,
    ) -> Encounter;
}

/// Default mapper: one order per distinct orderable concept, the encounter
/// keyed by the accession uuid.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessionMapper;

impl EncounterMapper for AccessionMapper {
    fn map_to_new(&self, accession: &Accession, visit: &Visit, ctx: &MapContext) -> Encounter {
        let mut enc = Encounter::new(
            accession.accession_uuid.clone(),
            visit.uuid.clone(),
            accession.patient_uuid.clone(),
            ctx.order_encounter_type.clone(),
            accession.effective_date(),
        )
        .with_provider(ctx.provider.clone(), ctx.role.clone());

        for detail in accession.test_details.iter().filter(|d| !d.is_canceled()) {
            let concept = detail.orderable_uuid();
            if !enc.orders.iter().any(|o| o.concept_uuid == concept) {
                enc.orders.push(Order::new(new_uuid(), concept));
            }
        }
        enc
    }

    fn map_to_existing(
        &self,
        _accession: &Accession,
        change_set: &ChangeSet,
        prior: &Encounter,
    ) -> Encounter {
        let mut enc = prior.clone();
        for detail in &change_set.added {
            enc.orders.push(Order::new(new_uuid(), detail.orderable_uuid()));
        }
        for detail in &change_set.removed {
            let concept = detail.orderable_uuid();
            for order in enc.orders.iter_mut().filter(|o| !o.voided && o.concept_uuid == concept) {
                order.voided = true;
            }
        }
        enc
    }
}
