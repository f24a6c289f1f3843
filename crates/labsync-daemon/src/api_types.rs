//! Request and response types for all labsync-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use labsync_runtime::FeedError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/events
// ---------------------------------------------------------------------------

/// One accession-changed notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
    /// Assigned by the daemon when absent.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Accession document path relative to the lab system base uri.
    pub content: String,
}

/// Body returned with any non-2xx event response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventErrorResponse {
    pub event_id: String,
    pub error: String,
    /// "FETCH" | "INVALID_ACCESSION" | "INTEGRITY" | "CONFIGURATION" | "PERSISTENCE" | "BAD_REQUEST"
    pub class: String,
    pub retryable: bool,
}

impl EventErrorResponse {
    pub fn from_feed_error(event_id: &str, err: &FeedError) -> Self {
        Self {
            event_id: event_id.to_string(),
            error: err.to_string(),
            class: err.class().to_string(),
            retryable: err.is_retryable(),
        }
    }
}
