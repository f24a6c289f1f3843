//! Shared runtime state for labsync-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum; this module owns
//! nothing async itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use labsync_runtime::{Dispatcher, FeedError, ProcessOutcome};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon counters, returned by GET /v1/status.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// Events that completed a pass, committed or not.
    pub processed: u64,
    /// Passes that wrote to the visit.
    pub committed: u64,
    pub failed: u64,
    /// Failures the sender should redeliver.
    pub failed_retryable: u64,
    /// Accessions currently locked or awaited in the dispatcher.
    pub in_flight_accessions: usize,
    pub last_event_id: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl StatusSnapshot {
    pub fn record_success(&mut self, outcome: &ProcessOutcome) {
        self.processed += 1;
        if outcome.committed {
            self.committed += 1;
        }
        self.last_event_id = Some(outcome.event_id.clone());
        self.last_event_at = Some(Utc::now());
    }

    pub fn record_failure(&mut self, event_id: &str, err: &FeedError) {
        self.failed += 1;
        if err.is_retryable() {
            self.failed_retryable += 1;
        }
        self.last_event_id = Some(event_id.to_string());
        self.last_event_at = Some(Utc::now());
        self.last_error = Some(err.to_string());
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub dispatcher: Dispatcher,
    pub status: Arc<RwLock<StatusSnapshot>>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            build: BuildInfo {
                service: "labsync-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            dispatcher,
            status: Arc::new(RwLock::new(StatusSnapshot::default())),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
