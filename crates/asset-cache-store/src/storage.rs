//! The set of named cache stores under one root directory

use crate::error::{Result, StoreError};
use crate::store::{read_descriptor, write_descriptor, CacheStore};
use crate::types::StoreDescriptor;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// All cache stores known to the runtime, keyed by name
pub struct CacheStorage {
    root: PathBuf,
    stores: RwLock<HashMap<String, Arc<CacheStore>>>,
}

impl CacheStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Ensure the root directory exists and load every store already on disk
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let mut loaded = HashMap::new();
        let mut reader = fs::read_dir(&self.root).await?;
        while let Some(item) = reader.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }

            let descriptor = match read_descriptor(&item.path()).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(
                        dir = ?item.path(),
                        error = %e,
                        "Ignoring directory without a readable store descriptor"
                    );
                    continue;
                }
            };

            let name = descriptor.name.clone();
            let store = CacheStore::load(descriptor, item.path()).await?;
            loaded.insert(name, Arc::new(store));
        }

        let count = loaded.len();
        *self.stores.write().await = loaded;
        info!(root = ?self.root, stores = count, "Cache storage initialized");
        Ok(())
    }

    /// Open the named store, creating it if absent
    pub async fn open(&self, name: &str) -> Result<Arc<CacheStore>> {
        if let Some(store) = self.get(name).await {
            return Ok(store);
        }

        let mut stores = self.stores.write().await;
        // Another caller may have created it while we waited for the lock
        if let Some(store) = stores.get(name) {
            return Ok(Arc::clone(store));
        }

        let dir = self.root.join(store_dir_name(name));
        fs::create_dir_all(&dir).await?;
        let descriptor = StoreDescriptor::new(name);
        write_descriptor(&dir, &descriptor).await?;

        let store = Arc::new(CacheStore::empty(descriptor, dir));
        stores.insert(name.to_string(), Arc::clone(&store));
        info!(store = %name, "Created cache store");
        Ok(store)
    }

    /// The named store if it exists; never creates one
    pub async fn get(&self, name: &str) -> Option<Arc<CacheStore>> {
        self.stores.read().await.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.stores.read().await.contains_key(name)
    }

    /// Delete the named store and its files. Returns `Ok(false)` if it did not exist.
    ///
    /// The store stays registered if its directory cannot be removed, so a
    /// later call can retry.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let mut stores = self.stores.write().await;
        let Some(store) = stores.get(name) else {
            return Ok(false);
        };

        match fs::remove_dir_all(store.dir()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(store = %name, "Store directory already gone");
            }
            Err(e) => return Err(StoreError::from(e)),
        }

        stores.remove(name);
        info!(store = %name, "Deleted cache store");
        Ok(true)
    }

    /// Names of every known store, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Directory name for a store; hashed so any store name is filesystem-safe
fn store_dir_name(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}
