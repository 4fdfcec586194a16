//! Dispatch table mapping lifecycle event kinds to async handlers

use crate::abort::AbortSignal;
use crate::cache::{ActivateReport, InstallReport};
use crate::error::{Result, WorkerError};
use crate::lifecycle::OfflineWorker;
use asset_fetcher::{AssetRequest, AssetResponse};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
        })
    }
}

/// A request to answer, with an optional signal that cancels it
#[derive(Debug, Clone)]
pub struct FetchEvent {
    pub request: AssetRequest,
    pub signal: Option<AbortSignal>,
}

impl FetchEvent {
    pub fn new(request: AssetRequest) -> Self {
        Self {
            request,
            signal: None,
        }
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// An event delivered by the hosting runtime
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchEvent),
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
        }
    }
}

/// What a handler resolved to
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Response(AssetResponse),
}

pub type EventHandler =
    Arc<dyn Fn(WorkerEvent) -> BoxFuture<'static, Result<EventOutcome>> + Send + Sync>;

/// Handlers registered once at startup, looked up per event
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<EventKind, EventHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous one
    pub fn register<F, Fut>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(WorkerEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<EventOutcome>> + Send + 'static,
    {
        self.handlers
            .insert(kind, Arc::new(move |event| handler(event).boxed()));
    }

    pub fn has(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run the handler for `event` to completion
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome> {
        let kind = event.kind();
        let handler = self
            .handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| WorkerError::NoHandler(kind.to_string()))?;
        handler(event).await
    }

    /// Table wired to `worker`'s install, activate and fetch operations
    pub fn for_worker(worker: Arc<OfflineWorker>) -> Self {
        let mut table = Self::new();

        let w = Arc::clone(&worker);
        table.register(EventKind::Install, move |_| {
            let worker = Arc::clone(&w);
            async move { worker.install().await.map(EventOutcome::Installed) }
        });

        let w = Arc::clone(&worker);
        table.register(EventKind::Activate, move |_| {
            let worker = Arc::clone(&w);
            async move { worker.activate().await.map(EventOutcome::Activated) }
        });

        table.register(EventKind::Fetch, move |event| {
            let worker = Arc::clone(&worker);
            async move {
                let response = match event {
                    WorkerEvent::Fetch(FetchEvent {
                        request,
                        signal: Some(signal),
                    }) => worker.fetch_with_abort(&request, &signal).await,
                    WorkerEvent::Fetch(FetchEvent {
                        request,
                        signal: None,
                    }) => worker.fetch(&request).await,
                    other => Err(WorkerError::State(format!(
                        "fetch handler received a {} event",
                        other.kind()
                    ))),
                };
                response.map(EventOutcome::Response)
            }
        });

        table
    }
}
