//! Worker lifecycle: one version moving from install through activation

use crate::abort::AbortSignal;
use crate::cache::{self, ActivateReport, InstallReport};
use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use asset_cache_store::{CacheStorage, StoreStats};
use asset_fetcher::{AssetRequest, AssetResponse, Network};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Lifecycle state of a worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Loaded, install not yet run
    #[default]
    Parsed,
    Installing,
    /// Installed, waiting for activation
    Installed,
    Activating,
    /// Active and handling fetches
    Activated,
    /// Install failed; this version never becomes active
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// One worker version bound to its config, cache storage and network
pub struct OfflineWorker {
    config: WorkerConfig,
    caches: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
}

impl OfflineWorker {
    pub fn new(config: WorkerConfig, caches: Arc<CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            caches,
            network,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Stats of the current store, if it exists yet
    pub async fn cache_stats(&self) -> Option<StoreStats> {
        match self.caches.get(&self.config.cache_name).await {
            Some(store) => Some(store.stats().await),
            None => None,
        }
    }

    /// Move `from` → `to`, failing if the worker is elsewhere
    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(WorkerError::State(format!(
                "cannot move to {} from {} (expected {})",
                to, *state, from
            )));
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }

    /// Pre-cache the manifest. On failure the worker becomes redundant.
    ///
    /// A version whose store was fully installed by an earlier run is not
    /// fetched again; its stored assets are reused.
    pub async fn install(&self) -> Result<InstallReport> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)
            .await?;

        if let Some(report) = self.reuse_installed().await {
            self.set_state(WorkerState::Installed).await;
            return Ok(report);
        }

        let result = match self
            .config
            .manifest
            .resolve(&self.config.scope, self.config.cross_origin_optional)
        {
            Ok(assets) => {
                cache::install(
                    &self.caches,
                    self.network.as_ref(),
                    &assets,
                    &self.config.cache_name,
                )
                .await
            }
            Err(e) => Err(WorkerError::InstallFailed(e.to_string())),
        };

        match &result {
            Ok(_) => self.set_state(WorkerState::Installed).await,
            Err(e) => {
                error!(
                    cache = %self.config.cache_name,
                    error = %e,
                    "Install failed, worker is redundant"
                );
                self.set_state(WorkerState::Redundant).await;
            }
        }
        result
    }

    async fn reuse_installed(&self) -> Option<InstallReport> {
        let store = self.caches.get(&self.config.cache_name).await?;
        if !store.is_installed() {
            return None;
        }

        let stored = store.len().await;
        info!(
            cache = %self.config.cache_name,
            stored,
            "Version already installed, reusing stored assets"
        );
        Some(InstallReport {
            cache_name: self.config.cache_name.clone(),
            stored,
            skipped: Vec::new(),
            reused: true,
        })
    }

    /// Drop stale stores and start handling fetches
    pub async fn activate(&self) -> Result<ActivateReport> {
        self.transition(WorkerState::Installed, WorkerState::Activating)
            .await?;

        let report = cache::activate(&self.caches, &self.config.cache_name).await?;
        self.set_state(WorkerState::Activated).await;

        info!(
            cache = %self.config.cache_name,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Worker activated"
        );
        Ok(report)
    }

    async fn ensure_active(&self) -> Result<()> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            return Err(WorkerError::State(format!(
                "fetch events need an activated worker (currently {})",
                state
            )));
        }
        Ok(())
    }

    /// Cache-first fetch against the current store
    pub async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        self.ensure_active().await?;
        cache::handle_fetch(
            &self.caches,
            self.network.as_ref(),
            request,
            &self.config.cache_name,
        )
        .await
    }

    pub async fn fetch_with_abort(
        &self,
        request: &AssetRequest,
        signal: &AbortSignal,
    ) -> Result<AssetResponse> {
        self.ensure_active().await?;
        cache::handle_fetch_with_abort(
            &self.caches,
            self.network.as_ref(),
            request,
            &self.config.cache_name,
            signal,
        )
        .await
    }
}
