//! Offline Asset Cache
//!
//! Cache-first asset loading for the docscanner front-end. A worker version
//! pre-caches its [`Manifest`] into a version-named store on install, deletes
//! every other store on activate, and then answers fetches from that store,
//! falling back to the network on a miss without ever writing back.
//!
//! The hosting runtime talks to a worker through a [`HandlerTable`]: one async
//! handler per [`EventKind`], each returning a future the runtime awaits
//! before treating the event as finished.

pub mod abort;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod manifest;

#[cfg(test)]
mod testing;

pub use abort::{AbortController, AbortSignal};
pub use cache::{
    activate, handle_fetch, handle_fetch_with_abort, install, ActivateReport, InstallReport,
};
pub use config::{WorkerConfig, DEFAULT_CACHE_NAME};
pub use error::{Result, WorkerError};
pub use handlers::{EventHandler, EventKind, EventOutcome, FetchEvent, HandlerTable, WorkerEvent};
pub use lifecycle::{OfflineWorker, WorkerState};
pub use manifest::{Manifest, ManifestEntry, ManifestVariant, ResolvedAsset};
