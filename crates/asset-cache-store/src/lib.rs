//! Persistent named cache stores
//!
//! A [`CacheStorage`] owns a root directory holding any number of named
//! [`CacheStore`]s. Each store maps a request identity (method + URL) to a
//! stored response, keeps its metadata in memory, and writes bodies and
//! metadata to disk so the contents survive a restart.

mod error;
mod storage;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use storage::CacheStorage;
pub use store::CacheStore;
pub use types::{EntryMeta, RequestKey, StoreDescriptor, StoreStats, StoredResponse};
