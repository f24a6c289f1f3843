//! labsync-runtime
//!
//! Wires the reconciliation core to its collaborators: fetch the accession,
//! create or update the order encounter, reconcile results into the visit,
//! commit once. Also ships the HTTP source, the Postgres store adapter and
//! the per-accession dispatcher.

mod dispatcher;
mod error;
mod pg_store;
mod ports;
mod source;
mod worker;

pub use dispatcher::Dispatcher;
pub use error::FeedError;
pub use pg_store::PgClinicalStore;
pub use ports::{AccessionSource, ClinicalStore};
pub use source::HttpAccessionSource;
pub use worker::{AccessionWorker, OrderEncounterChange, ProcessOutcome};
