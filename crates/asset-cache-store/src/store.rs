//! A single named cache store backed by a directory

use crate::error::Result;
use crate::types::{EntryMeta, RequestKey, StoreDescriptor, StoreStats, StoredResponse};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub(crate) const DESCRIPTOR_FILE: &str = "store.json";
const META_SUFFIX: &str = ".meta.json";
const BODY_SUFFIX: &str = ".body";

/// A named store with in-memory metadata and file-based bodies
pub struct CacheStore {
    name: String,
    created_at: DateTime<Utc>,
    installed: AtomicBool,
    dir: PathBuf,
    /// Metadata keyed by request digest
    entries: RwLock<HashMap<String, EntryMeta>>,
    current_size: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    /// Create an empty store rooted at `dir`; the directory must already exist
    pub(crate) fn empty(descriptor: StoreDescriptor, dir: PathBuf) -> Self {
        Self {
            name: descriptor.name,
            created_at: descriptor.created_at,
            installed: AtomicBool::new(descriptor.installed),
            dir,
            entries: RwLock::new(HashMap::new()),
            current_size: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Load a store and the metadata of every entry found in `dir`
    pub(crate) async fn load(descriptor: StoreDescriptor, dir: PathBuf) -> Result<Self> {
        let name = descriptor.name.as_str();
        let mut entries = HashMap::new();
        let mut total = 0u64;

        let mut reader = fs::read_dir(&dir).await?;
        while let Some(item) = reader.next_entry().await? {
            let file_name = item.file_name();
            let Some(digest) = file_name.to_str().and_then(|n| n.strip_suffix(META_SUFFIX))
            else {
                continue;
            };

            let raw = fs::read(item.path()).await?;
            let meta: EntryMeta = match serde_json::from_slice(&raw) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(
                        store = %name,
                        file = ?item.path(),
                        error = %e,
                        "Skipping unreadable entry metadata"
                    );
                    continue;
                }
            };

            if fs::metadata(body_path(&dir, digest)).await.is_err() {
                warn!(
                    store = %name,
                    url = %meta.key.url,
                    "Entry body missing, dropping metadata"
                );
                let _ = fs::remove_file(item.path()).await;
                continue;
            }

            total += meta.size;
            entries.insert(digest.to_string(), meta);
        }

        debug!(store = %name, entries = entries.len(), total_size = total, "Loaded cache store");

        Ok(Self {
            name: descriptor.name.clone(),
            created_at: descriptor.created_at,
            installed: AtomicBool::new(descriptor.installed),
            dir,
            entries: RwLock::new(entries),
            current_size: AtomicU64::new(total),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the store's files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a full install of this version has completed
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Persist the installed flag so a restart of the same version skips install
    pub async fn mark_installed(&self) -> Result<()> {
        let descriptor = StoreDescriptor {
            name: self.name.clone(),
            created_at: self.created_at,
            installed: true,
        };
        write_descriptor(&self.dir, &descriptor).await?;
        self.installed.store(true, Ordering::Release);
        debug!(store = %self.name, "Marked store installed");
        Ok(())
    }

    /// Look up a request. An entry whose body cannot be read is a miss; the
    /// store is left untouched.
    pub async fn match_request(&self, key: &RequestKey) -> Option<StoredResponse> {
        let digest = key.digest();

        let meta = {
            let entries = self.entries.read().await;
            entries.get(&digest).cloned()
        };

        if let Some(meta) = meta {
            match fs::read(body_path(&self.dir, &digest)).await {
                Ok(body) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(store = %self.name, url = %key.url, "Cache hit");
                    return Some(StoredResponse {
                        url: meta.response_url,
                        status: meta.status,
                        headers: meta.headers,
                        body,
                    });
                }
                Err(e) => {
                    warn!(
                        store = %self.name,
                        url = %key.url,
                        error = %e,
                        "Failed to read cached body, treating as a miss"
                    );
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a response under `key`, replacing any previous entry
    pub async fn put(&self, key: &RequestKey, response: &StoredResponse) -> Result<()> {
        let digest = key.digest();
        let size = response.body.len() as u64;

        let meta = EntryMeta {
            key: key.clone(),
            response_url: response.url.clone(),
            status: response.status,
            headers: response.headers.clone(),
            size,
            created_at: Utc::now(),
        };

        // Body first so a metadata file never points at a missing body
        fs::write(body_path(&self.dir, &digest), &response.body).await?;
        fs::write(meta_path(&self.dir, &digest), serde_json::to_vec(&meta)?).await?;

        let previous = {
            let mut entries = self.entries.write().await;
            entries.insert(digest, meta)
        };

        if let Some(previous) = previous {
            self.current_size.fetch_sub(previous.size, Ordering::Relaxed);
        }
        self.current_size.fetch_add(size, Ordering::Relaxed);
        debug!(store = %self.name, url = %key.url, size, "Stored response");

        Ok(())
    }

    /// Delete the entry for `key`, returning whether one existed
    pub async fn delete(&self, key: &RequestKey) -> bool {
        let digest = key.digest();
        let entry = {
            let mut entries = self.entries.write().await;
            entries.remove(&digest)
        };

        match entry {
            Some(entry) => {
                self.current_size.fetch_sub(entry.size, Ordering::Relaxed);
                let _ = fs::remove_file(meta_path(&self.dir, &digest)).await;
                let _ = fs::remove_file(body_path(&self.dir, &digest)).await;
                true
            }
            None => false,
        }
    }

    /// All request identities held by the store
    pub async fn keys(&self) -> Vec<RequestKey> {
        let entries = self.entries.read().await;
        entries.values().map(|m| m.key.clone()).collect()
    }

    pub async fn contains(&self, key: &RequestKey) -> bool {
        self.entries.read().await.contains_key(&key.digest())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> StoreStats {
        let entries = self.entries.read().await;
        StoreStats {
            entries: entries.len(),
            total_size: self.current_size.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

pub(crate) async fn read_descriptor(dir: &Path) -> Result<StoreDescriptor> {
    let raw = fs::read(dir.join(DESCRIPTOR_FILE)).await?;
    Ok(serde_json::from_slice(&raw)?)
}

pub(crate) async fn write_descriptor(dir: &Path, descriptor: &StoreDescriptor) -> Result<()> {
    fs::write(dir.join(DESCRIPTOR_FILE), serde_json::to_vec(descriptor)?).await?;
    Ok(())
}

fn meta_path(dir: &Path, digest: &str) -> PathBuf {
    dir.join(format!("{}{}", digest, META_SUFFIX))
}

fn body_path(dir: &Path, digest: &str) -> PathBuf {
    dir.join(format!("{}{}", digest, BODY_SUFFIX))
}
