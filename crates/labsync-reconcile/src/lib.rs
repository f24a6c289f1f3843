//! labsync-reconcile
//!
//! Lab result reconciliation engine.
//!
//! Given a fetched accession and the visit that holds its order encounter,
//! decides per result whether to reuse, void-and-recreate, or create an
//! observation, and which result encounter it belongs to.
//!
//! Deterministic, pure logic. No IO. The caller persists the visit.

mod diff;
mod engine;
mod error;
mod mapper;
mod matcher;
mod provider;
mod types;

pub use diff::{diff, ChangeSet};
pub use engine::{
    reconcile_results, validate_results, ReconcileAnomaly, ReconcileContext, ReconcileReport,
    VOID_REASON_EMPTY_GROUP, VOID_REASON_UPDATED,
};
pub use error::ReconcileError;
pub use mapper::{AccessionMapper, EncounterMapper, MapContext};
pub use matcher::{find_order, find_result_encounter, find_result_location, find_result_obs};
pub use provider::{ProviderDirectory, ProviderResolver, StaticProviderDirectory};
pub use types::*;
