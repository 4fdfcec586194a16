//! Configuration and response types for the docscanner worker

use asset_cache_store::StoreStats;
use clap::Parser;
use offline_asset_cache::{ManifestVariant, WorkerState, DEFAULT_CACHE_NAME};
use serde::Serialize;
use std::path::PathBuf;
use url::Url;

/// Service configuration, from flags or the environment
#[derive(Debug, Clone, Parser)]
#[command(
    name = "docscanner-worker",
    about = "Cache-first offline proxy for the docscanner front-end"
)]
pub struct ServiceConfig {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3005)]
    pub port: u16,

    /// Upstream that serves the scope's origin, for install and cache misses
    #[arg(long, env = "ORIGIN_URL", default_value = "http://localhost:8080/")]
    pub origin: Url,

    /// Public URL the front-end is served under; manifest entries and
    /// intercepted requests are resolved against it (defaults to the origin)
    #[arg(long, env = "SCOPE_URL")]
    pub scope: Option<Url>,

    /// Directory holding the cache stores
    #[arg(long, env = "CACHE_DIR", default_value = "./cache/assets")]
    pub cache_dir: PathBuf,

    /// Version-qualified name of the current cache store
    #[arg(long, env = "CACHE_NAME", default_value = DEFAULT_CACHE_NAME)]
    pub cache_name: String,

    /// Built-in manifest: document-relative or root-relative
    #[arg(long, env = "MANIFEST_VARIANT", default_value = "document-relative")]
    pub manifest_variant: ManifestVariant,

    /// JSON manifest file, overriding the built-in variant
    #[arg(long, env = "MANIFEST_PATH")]
    pub manifest_path: Option<PathBuf>,

    /// Let cross-origin manifest entries fail without failing install
    #[arg(long, env = "CROSS_ORIGIN_OPTIONAL")]
    pub cross_origin_optional: bool,

    /// Network timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn scope(&self) -> &Url {
        self.scope.as_ref().unwrap_or(&self.origin)
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub worker_state: WorkerState,
    pub cache_name: String,
    pub uptime_secs: u64,
    pub cache: Option<StoreStats>,
}
