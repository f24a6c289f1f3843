//! `labsync process`: run accession notifications through the worker against
//! the configured lab system and database.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use labsync_config::secrets::resolve_elis_credentials;
use labsync_reconcile::AccessionMapper;
use labsync_runtime::{
    AccessionWorker, Dispatcher, FeedError, HttpAccessionSource, PgClinicalStore, ProcessOutcome,
};
use labsync_schemas::AccessionEvent;

use super::load_settings;

pub struct ProcessArgs {
    pub config_paths: Vec<String>,
    pub contents: Vec<String>,
    pub concurrency: Option<usize>,
    pub strict_config: bool,
}

pub async fn process(args: ProcessArgs) -> Result<()> {
    let (loaded, settings) = load_settings(&args.config_paths, args.strict_config)?;
    let credentials = resolve_elis_credentials(&loaded.config_json)?;
    let concurrency = args.concurrency.unwrap_or(settings.worker_concurrency);
    if concurrency == 0 {
        bail!("--concurrency must be >= 1");
    }

    let pool = labsync_db::connect_from_env().await?;
    let source = HttpAccessionSource::new(&settings.elis, credentials).context("build lab system client")?;
    let worker = AccessionWorker::new(
        Arc::new(source),
        Arc::new(PgClinicalStore::new(pool)),
        Arc::new(AccessionMapper),
        settings,
    );
    let dispatcher = Dispatcher::new(Arc::new(worker), concurrency);

    let events: Vec<AccessionEvent> = args
        .contents
        .iter()
        .enumerate()
        .map(|(i, c)| AccessionEvent::new(format!("cli-{}", i + 1), c.clone()))
        .collect();

    println!("config_hash={}", loaded.config_hash);
    let results = dispatcher.dispatch_all(events).await;

    let mut failed = 0usize;
    for r in &results {
        match r {
            Ok(out) => print_outcome(out),
            Err(err) => {
                failed += 1;
                print_failure(err);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} event(s) failed", results.len());
    }
    Ok(())
}

fn print_outcome(out: &ProcessOutcome) {
    println!(
        "event={} accession={} visit={} committed={} created={} voided={} unchanged={} pending={} anomalies={}",
        out.event_id,
        out.accession_uuid,
        out.visit_uuid,
        out.committed,
        out.report.created_observations,
        out.report.voided_observations,
        out.report.unchanged,
        out.report.pending,
        out.report.anomalies.len()
    );
}

fn print_failure(err: &FeedError) {
    println!(
        "failed=true class={} retryable={} error={}",
        err.class(),
        err.is_retryable(),
        err
    );
}
