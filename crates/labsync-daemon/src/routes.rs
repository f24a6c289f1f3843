//! Axum router and all HTTP handlers for labsync-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use labsync_runtime::FeedError;
use labsync_schemas::AccessionEvent;
use tracing::info;
use uuid::Uuid;

use crate::{
    api_types::{EventErrorResponse, EventRequest, HealthResponse},
    state::{uptime_secs, AppState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/events", post(post_event))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();
    snap.in_flight_accessions = st.dispatcher.tracked_keys();
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/events
// ---------------------------------------------------------------------------

/// HTTP status for a failed pass. Retryable failures map to 502 so the
/// sender redelivers; the rest tell it to stop.
pub fn status_for(err: &FeedError) -> StatusCode {
    match err {
        FeedError::InvalidAccession(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FeedError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FeedError::Fetch(_) | FeedError::Integrity(_) | FeedError::Persistence(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Dispatch one notification and wait for its pass to finish.
pub(crate) async fn post_event(
    State(st): State<Arc<AppState>>,
    Json(req): Json<EventRequest>,
) -> Response {
    let event_id = req
        .event_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let event = AccessionEvent::new(event_id.clone(), req.content);
    if event.accession_key().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(EventErrorResponse {
                event_id,
                error: "content must name an accession".to_string(),
                class: "BAD_REQUEST".to_string(),
                retryable: false,
            }),
        )
            .into_response();
    }

    info!(event_id = %event_id, content = %event.content, "events/post");
    match st.dispatcher.dispatch(event).await {
        Ok(outcome) => {
            st.status.write().await.record_success(&outcome);
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(err) => {
            st.status.write().await.record_failure(&event_id, &err);
            (
                status_for(&err),
                Json(EventErrorResponse::from_feed_error(&event_id, &err)),
            )
                .into_response()
        }
    }
}
