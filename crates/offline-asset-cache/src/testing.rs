//! In-memory network double for tests

use asset_fetcher::{AssetRequest, AssetResponse, FetchError, Network, ResponseSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

const ORIGIN: &str = "https://scan.example/";

/// Answers from a fixed route table and counts every fetch.
/// Unknown URLs fail like an unreachable host.
pub struct FakeNetwork {
    routes: HashMap<String, (u16, Vec<u8>)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn serve(self, path: &str, body: &[u8]) -> Self {
        self.respond(path, 200, body)
    }

    pub fn respond(mut self, path: &str, status: u16, body: &[u8]) -> Self {
        let url = Url::parse(ORIGIN).unwrap().join(path).unwrap();
        self.routes.insert(url.to_string(), (status, body.to_vec()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &AssetRequest) -> asset_fetcher::Result<AssetResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut url = request.url.clone();
        url.set_fragment(None);

        match self.routes.get(url.as_str()) {
            Some((status, body)) => Ok(AssetResponse {
                url: url.to_string(),
                status: *status,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: body.clone(),
                source: ResponseSource::Network,
            }),
            None => Err(FetchError::InvalidRequest(format!(
                "no route to host for {}",
                url
            ))),
        }
    }
}
