//! Install, activate and cache-first fetch handling
//!
//! These are the three operations the worker lifecycle drives. They take
//! their collaborators explicitly so each can be exercised on its own.

use crate::abort::AbortSignal;
use crate::error::{Result, WorkerError};
use crate::manifest::ResolvedAsset;
use asset_cache_store::{CacheStorage, RequestKey, StoredResponse};
use asset_fetcher::{AssetRequest, AssetResponse, Network, ResponseSource};
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of a successful install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cache_name: String,
    pub stored: usize,
    /// Optional URLs that could not be fetched
    pub skipped: Vec<String>,
    /// The store was already fully installed by an earlier run and was reused as-is
    pub reused: bool,
}

/// Outcome of an activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    /// Stale stores whose deletion failed; retried on the next activation
    pub failed: Vec<String>,
}

/// Fetch every asset and store it in `cache_name`.
///
/// All fetches run concurrently and nothing is written until every required
/// asset has answered with a 2xx status. A failing required asset fails the
/// whole install; failing optional assets are skipped.
pub async fn install(
    caches: &CacheStorage,
    network: &dyn Network,
    assets: &[ResolvedAsset],
    cache_name: &str,
) -> Result<InstallReport> {
    let mut seen = HashSet::new();
    for asset in assets {
        if !seen.insert(RequestKey::get(&asset.url)) {
            return Err(WorkerError::InstallFailed(format!(
                "duplicate manifest URL {}",
                asset.url
            )));
        }
    }

    let store = caches.open(cache_name).await?;

    info!(cache = %cache_name, assets = assets.len(), "Installing assets");

    let fetches = assets.iter().map(|asset| async move {
        let request = AssetRequest::get(asset.url.clone());
        let outcome = match network.fetch(&request).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(format!("status {}", response.status)),
            Err(e) => Err(e.to_string()),
        };
        (asset, outcome)
    });
    let results = join_all(fetches).await;

    let mut fetched = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for (asset, outcome) in results {
        match outcome {
            Ok(response) => fetched.push((asset, response)),
            Err(reason) if asset.optional => {
                warn!(url = %asset.url, reason = %reason, "Skipping optional asset");
                skipped.push(asset.url.to_string());
            }
            Err(reason) => {
                return Err(WorkerError::InstallFailed(format!(
                    "{}: {}",
                    asset.url, reason
                )));
            }
        }
    }

    for (asset, response) in &fetched {
        store
            .put(&RequestKey::get(&asset.url), &to_stored(response))
            .await
            .map_err(|e| {
                WorkerError::InstallFailed(format!("cannot store {}: {}", asset.url, e))
            })?;
    }
    store.mark_installed().await?;

    info!(
        cache = %cache_name,
        stored = fetched.len(),
        skipped = skipped.len(),
        "Install complete"
    );

    Ok(InstallReport {
        cache_name: cache_name.to_string(),
        stored: fetched.len(),
        skipped,
        reused: false,
    })
}

/// Delete every store except `current`.
///
/// Deletion failures are logged and reported, never returned as errors.
pub async fn activate(caches: &CacheStorage, current: &str) -> Result<ActivateReport> {
    let mut report = ActivateReport::default();

    for name in caches.keys().await {
        if name == current {
            continue;
        }

        match caches.delete(&name).await {
            Ok(_) => {
                info!(cache = %name, "Deleted stale cache");
                report.deleted.push(name);
            }
            Err(e) => {
                let err = WorkerError::ActivationCleanupFailed {
                    cache_name: name.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %err, "Stale cache cleanup failed");
                report.failed.push(name);
            }
        }
    }

    Ok(report)
}

/// Serve `request` from `cache_name`, falling back to the network on a miss.
///
/// Only `GET` requests are looked up. Network responses are returned as-is
/// and never written back to the store.
pub async fn handle_fetch(
    caches: &CacheStorage,
    network: &dyn Network,
    request: &AssetRequest,
    cache_name: &str,
) -> Result<AssetResponse> {
    if request.is_get() {
        if let Some(store) = caches.get(cache_name).await {
            if let Some(stored) = store.match_request(&RequestKey::get(&request.url)).await {
                return Ok(from_stored(stored));
            }
        }
    }

    debug!(method = %request.method, url = %request.url, "Cache miss, going to network");

    network
        .fetch(request)
        .await
        .map_err(|e| WorkerError::FetchFailed {
            url: request.url.to_string(),
            reason: e.to_string(),
        })
}

/// [`handle_fetch`] that stops and reports [`WorkerError::Cancelled`] once `signal` fires
pub async fn handle_fetch_with_abort(
    caches: &CacheStorage,
    network: &dyn Network,
    request: &AssetRequest,
    cache_name: &str,
    signal: &AbortSignal,
) -> Result<AssetResponse> {
    if signal.is_aborted() {
        return Err(WorkerError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = signal.aborted() => {
            debug!(url = %request.url, "Fetch aborted by requester");
            Err(WorkerError::Cancelled)
        }
        result = handle_fetch(caches, network, request, cache_name) => result,
    }
}

fn to_stored(response: &AssetResponse) -> StoredResponse {
    StoredResponse {
        url: response.url.clone(),
        status: response.status,
        headers: response.headers.clone(),
        body: response.body.clone(),
    }
}

fn from_stored(stored: StoredResponse) -> AssetResponse {
    AssetResponse {
        url: stored.url,
        status: stored.status,
        headers: stored.headers,
        body: stored.body,
        source: ResponseSource::Cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortController;
    use crate::testing::FakeNetwork;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use url::Url;

    const CACHE: &str = "docscanner-cache-v1";

    async fn storage() -> (TempDir, CacheStorage) {
        let dir = tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().to_path_buf());
        storage.init().await.unwrap();
        (dir, storage)
    }

    fn url(path: &str) -> Url {
        Url::parse("https://scan.example/").unwrap().join(path).unwrap()
    }

    fn assets(paths: &[&str]) -> Vec<ResolvedAsset> {
        paths
            .iter()
            .map(|p| ResolvedAsset {
                url: url(p),
                optional: false,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_install_stores_every_asset() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new()
            .serve("/", b"root")
            .serve("/index.html", b"<html>")
            .serve("/manifest.json", b"{}");
        let assets = assets(&["/", "/index.html", "/manifest.json"]);

        let report = install(&caches, &network, &assets, CACHE).await.unwrap();
        assert_eq!(report.stored, 3);
        assert!(report.skipped.is_empty());
        assert!(!report.reused);

        let store = caches.get(CACHE).await.unwrap();
        assert!(store.is_installed());
        for asset in &assets {
            assert!(store.contains(&RequestKey::get(&asset.url)).await);
        }
    }

    #[tokio::test]
    async fn test_install_fails_on_unreachable_asset() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new().serve("/index.html", b"<html>");
        let assets = assets(&["/index.html", "/icons/icon-192.png"]);

        let result = install(&caches, &network, &assets, CACHE).await;
        match result {
            Err(WorkerError::InstallFailed(msg)) => assert!(msg.contains("icon-192.png")),
            other => panic!("expected InstallFailed, got {:?}", other),
        }

        // Nothing is written when a fetch fails
        let store = caches.get(CACHE).await.unwrap();
        assert!(store.is_empty().await);
        assert!(!store.is_installed());
    }

    #[tokio::test]
    async fn test_install_fails_on_error_status() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new()
            .serve("/index.html", b"<html>")
            .respond("/manifest.json", 404, b"not found");
        let assets = assets(&["/index.html", "/manifest.json"]);

        let result = install(&caches, &network, &assets, CACHE).await;
        assert!(matches!(result, Err(WorkerError::InstallFailed(msg)) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_install_skips_failed_optional_asset() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new().serve("/index.html", b"<html>");
        let mut assets = assets(&["/index.html"]);
        assets.push(ResolvedAsset {
            url: Url::parse("https://docs.opencv.org/4.x/opencv.js").unwrap(),
            optional: true,
        });

        let report = install(&caches, &network, &assets, CACHE).await.unwrap();
        assert_eq!(report.stored, 1);
        assert_eq!(report.skipped, vec!["https://docs.opencv.org/4.x/opencv.js"]);
    }

    #[tokio::test]
    async fn test_install_rejects_duplicates() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new().serve("/index.html", b"<html>");
        let assets = assets(&["/index.html", "/index.html#top"]);

        let result = install(&caches, &network, &assets, CACHE).await;
        assert!(matches!(
            result,
            Err(WorkerError::InstallFailed(msg)) if msg.contains("duplicate")
        ));
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_activate_removes_stale_stores() {
        let (_dir, caches) = storage().await;
        caches.open("docscanner-cache-v0").await.unwrap();
        caches.open("other-app-cache").await.unwrap();
        caches.open(CACHE).await.unwrap();

        let report = activate(&caches, CACHE).await.unwrap();
        assert_eq!(
            report.deleted,
            vec!["docscanner-cache-v0".to_string(), "other-app-cache".to_string()]
        );
        assert_eq!(caches.keys().await, vec![CACHE.to_string()]);

        // Idempotent
        let report = activate(&caches, CACHE).await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(caches.keys().await, vec![CACHE.to_string()]);
    }

    #[tokio::test]
    async fn test_activate_reports_failed_cleanup() {
        let (_dir, caches) = storage().await;
        caches.open(CACHE).await.unwrap();
        let stale = caches.open("docscanner-cache-v0").await.unwrap();

        // A regular file where the store directory was makes the delete fail
        let stale_dir = stale.dir().to_path_buf();
        std::fs::remove_dir_all(&stale_dir).unwrap();
        std::fs::write(&stale_dir, b"not a directory").unwrap();

        let report = activate(&caches, CACHE).await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(report.failed, vec!["docscanner-cache-v0".to_string()]);
        assert!(caches.has("docscanner-cache-v0").await);

        // The next activation retries
        std::fs::remove_file(&stale_dir).unwrap();
        let report = activate(&caches, CACHE).await.unwrap();
        assert_eq!(report.deleted, vec!["docscanner-cache-v0".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_without_current_store() {
        let (_dir, caches) = storage().await;
        caches.open("docscanner-cache-v0").await.unwrap();

        activate(&caches, CACHE).await.unwrap();
        assert!(caches.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_hit_skips_network() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new().serve("/index.html", b"<html>v1");
        install(&caches, &network, &assets(&["/index.html"]), CACHE)
            .await
            .unwrap();
        let installs = network.calls();

        let request = AssetRequest::get(url("/index.html"));
        let response = handle_fetch(&caches, &network, &request, CACHE)
            .await
            .unwrap();

        assert_eq!(response.body, b"<html>v1");
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(network.calls(), installs);
    }

    #[tokio::test]
    async fn test_fetch_miss_goes_to_network_once() {
        let (_dir, caches) = storage().await;
        caches.open(CACHE).await.unwrap();
        let network = FakeNetwork::new().respond("/missing.png", 404, b"nope");

        let request = AssetRequest::get(url("/missing.png"));
        let response = handle_fetch(&caches, &network, &request, CACHE)
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, b"nope");
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_miss_is_never_written_back() {
        let (_dir, caches) = storage().await;
        caches.open(CACHE).await.unwrap();
        let network = FakeNetwork::new().serve("/scan.js", b"js");
        let request = AssetRequest::get(url("/scan.js"));

        handle_fetch(&caches, &network, &request, CACHE).await.unwrap();
        handle_fetch(&caches, &network, &request, CACHE).await.unwrap();

        let store = caches.get(CACHE).await.unwrap();
        assert!(!store.contains(&RequestKey::get(&request.url)).await);
        assert_eq!(network.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_network_failure_propagates() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new();

        let request = AssetRequest::get(url("/offline"));
        let result = handle_fetch(&caches, &network, &request, CACHE).await;
        assert!(matches!(
            result,
            Err(WorkerError::FetchFailed { url, .. }) if url.ends_with("/offline")
        ));
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new().serve("/index.html", b"<html>");
        install(&caches, &network, &assets(&["/index.html"]), CACHE)
            .await
            .unwrap();
        let before = network.calls();

        let request = AssetRequest::new("POST", url("/index.html"));
        let response = handle_fetch(&caches, &network, &request, CACHE).await.unwrap();

        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(network.calls(), before + 1);
    }

    #[tokio::test]
    async fn test_abort_cancels_slow_fetch() {
        let (_dir, caches) = storage().await;
        let network = Arc::new(
            FakeNetwork::new()
                .serve("/slow", b"late")
                .with_delay(Duration::from_secs(30)),
        );
        let controller = AbortController::new();
        let signal = controller.signal();

        let task = {
            let network = Arc::clone(&network);
            tokio::spawn(async move {
                handle_fetch_with_abort(
                    &caches,
                    network.as_ref(),
                    &AssetRequest::get(url("/slow")),
                    CACHE,
                    &signal,
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.abort();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(WorkerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_aborted_skips_network() {
        let (_dir, caches) = storage().await;
        let network = FakeNetwork::new().serve("/index.html", b"<html>");
        let controller = AbortController::new();
        controller.abort();

        let result = handle_fetch_with_abort(
            &caches,
            &network,
            &AssetRequest::get(url("/index.html")),
            CACHE,
            &controller.signal(),
        )
        .await;

        assert!(matches!(result, Err(WorkerError::Cancelled)));
        assert_eq!(network.calls(), 0);
    }
}
