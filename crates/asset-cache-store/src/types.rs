//! Cache store types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Identity of a cached request: upper-cased method plus the URL without its fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// Key for a plain `GET` of `url`
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    /// Hex-encoded SHA-256 of the identity, used as the on-disk file stem
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{} {}", self.method, self.url).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A response as held by a cache store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    /// URL the response was finally served from (after redirects)
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// On-disk metadata for one cache entry; the body lives next to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: RequestKey,
    pub response_url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Descriptor written at the root of every store directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDescriptor {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Set once every required asset of the version has been stored
    #[serde(default)]
    pub installed: bool,
}

impl StoreDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            installed: false,
        }
    }
}

/// Statistics about a single store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
