//! labsync-daemon entry point.
//!
//! Thin: sets up tracing, loads config, wires the worker to Postgres and
//! the lab system, and starts the HTTP server. Route handlers live in
//! `routes.rs`; shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use labsync_config::secrets::resolve_elis_credentials;
use labsync_daemon::{routes, state};
use labsync_reconcile::AccessionMapper;
use labsync_runtime::{AccessionWorker, Dispatcher, HttpAccessionSource, PgClinicalStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

const ENV_CONFIG_PATHS: &str = "LABSYNC_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/labsync.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = labsync_config::load_layered_yaml(&refs).context("load config failed")?;
    let report = labsync_config::report_unused_keys(&loaded.config_json, labsync_config::UnusedKeyPolicy::Warn)?;
    for key in &report.unused_leaf_pointers {
        tracing::warn!(pointer = %key, "unused config key");
    }
    let settings = loaded.settings()?;
    let credentials = resolve_elis_credentials(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, base_uri = %settings.elis.base_uri, "config loaded");

    let pool = labsync_db::connect_from_env().await?;
    let concurrency = settings.worker_concurrency;
    let source = HttpAccessionSource::new(&settings.elis, credentials)?;
    let worker = AccessionWorker::new(
        Arc::new(source),
        Arc::new(PgClinicalStore::new(pool)),
        Arc::new(AccessionMapper),
        settings,
    );
    let shared = Arc::new(state::AppState::new(Dispatcher::new(Arc::new(worker), concurrency)));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("labsync-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Comma-separated layer paths in merge order.
fn config_paths_from_env() -> Vec<String> {
    std::env::var(ENV_CONFIG_PATHS)
        .ok()
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_CONFIG_PATH.to_string()])
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("LABSYNC_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
