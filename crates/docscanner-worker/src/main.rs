//! Docscanner Worker - Cache-first offline proxy
//!
//! Pre-caches the docscanner front-end's assets on start, then serves every
//! request from the cache when it can and from the upstream origin when it
//! cannot.

mod error;
mod server;
mod types;

use crate::error::Result;
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ServiceConfig;
use asset_cache_store::CacheStorage;
use asset_fetcher::{HttpNetwork, UpstreamNetwork};
use clap::Parser;
use offline_asset_cache::{
    EventOutcome, HandlerTable, Manifest, OfflineWorker, WorkerConfig, WorkerEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("docscanner_worker=info".parse()?)
        .add_directive("offline_asset_cache=info".parse()?)
        .add_directive("asset_cache_store=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Docscanner Worker...");

    let config = ServiceConfig::parse();
    info!("Port: {}", config.port);
    info!("Origin: {}", config.origin);
    info!("Scope: {}", config.scope());
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Cache name: {}", config.cache_name);

    let manifest = match &config.manifest_path {
        Some(path) => {
            info!("Manifest: {:?}", path);
            Manifest::load(path).await?
        }
        None => {
            info!("Manifest: built-in {:?}", config.manifest_variant);
            Manifest::builtin(config.manifest_variant)
        }
    };

    let scope = config.scope().clone();
    let worker_config = WorkerConfig::new(config.cache_name.clone(), scope.clone(), manifest)
        .with_cross_origin_optional(config.cross_origin_optional);

    let caches = CacheStorage::new(config.cache_dir.clone());
    caches.init().await?;

    // Requests for the scope's origin are served by the configured upstream
    let http = HttpNetwork::with_timeout(Duration::from_secs(config.fetch_timeout_secs))?;
    let network = UpstreamNetwork::new(http, scope.clone(), config.origin.clone());

    let worker = Arc::new(OfflineWorker::new(
        worker_config,
        Arc::new(caches),
        Arc::new(network),
    ));
    let handlers = HandlerTable::for_worker(Arc::clone(&worker));

    // Install must finish before activation, and activation before any fetch.
    // A version already installed by an earlier run reuses its store.
    if let EventOutcome::Installed(report) = handlers.dispatch(WorkerEvent::Install).await? {
        info!(
            "Install: {} assets stored, {} skipped{}",
            report.stored,
            report.skipped.len(),
            if report.reused { " (reused)" } else { "" }
        );
    }
    handlers.dispatch(WorkerEvent::Activate).await?;

    let state: SharedState = Arc::new(ServerState::new(worker, handlers, scope));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
