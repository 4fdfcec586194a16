//! Live network access

use crate::error::{FetchError, Result};
use crate::types::{AssetRequest, AssetResponse, ResponseSource};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Something that can perform a live fetch for a request
///
/// A non-2xx status is a successful fetch; only transport failures are errors.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse>;
}

/// reqwest-backed [`Network`]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    /// Create a client whose requests time out after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            FetchError::InvalidRequest(format!("unsupported method {:?}", request.method))
        })?;

        debug!(method = %method, url = %request.url, "Fetching from network");

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(status, url = %url, size = body.len(), "Network response");

        Ok(AssetResponse {
            url,
            status,
            headers,
            body,
            source: ResponseSource::Network,
        })
    }
}

/// Sends requests for the public origin to an upstream origin instead.
///
/// Only scheme, host and port change; path and query stay as requested.
/// Requests for any other origin pass through untouched.
pub struct UpstreamNetwork<N> {
    inner: N,
    public: Url,
    upstream: Url,
}

impl<N: Network> UpstreamNetwork<N> {
    pub fn new(inner: N, public: Url, upstream: Url) -> Self {
        Self {
            inner,
            public,
            upstream,
        }
    }

    /// URL a request for `url` is actually sent to
    pub fn upstream_url(&self, url: &Url) -> Result<Url> {
        if url.origin() != self.public.origin() || self.public.origin() == self.upstream.origin() {
            return Ok(url.clone());
        }

        let invalid = || {
            FetchError::InvalidRequest(format!("cannot rebase {} onto {}", url, self.upstream))
        };
        let mut rebased = url.clone();
        rebased.set_scheme(self.upstream.scheme()).map_err(|_| invalid())?;
        rebased
            .set_host(self.upstream.host_str())
            .map_err(|_| invalid())?;
        rebased.set_port(self.upstream.port()).map_err(|_| invalid())?;
        Ok(rebased)
    }
}

#[async_trait]
impl<N: Network> Network for UpstreamNetwork<N> {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        let url = self.upstream_url(&request.url)?;
        if url == request.url {
            return self.inner.fetch(request).await;
        }

        debug!(public = %request.url, upstream = %url, "Sending request upstream");
        let mut upstream = request.clone();
        upstream.url = url;
        self.inner.fetch(&upstream).await
    }
}
