//! HTTP server for the docscanner worker
//!
//! `/__worker/health` reports worker and cache state; every other request is
//! intercepted and answered by the worker's fetch handler. Intercepted
//! requests are addressed on the worker scope's origin, so they share keys
//! with the pre-cached manifest URLs.

use crate::error::ServerError;
use crate::types::HealthResponse;
use asset_fetcher::{AssetRequest, AssetResponse, ResponseSource};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use offline_asset_cache::{
    AbortController, EventOutcome, FetchEvent, HandlerTable, OfflineWorker, WorkerEvent,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use url::Url;

/// Largest request body forwarded upstream
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Headers that describe one connection and are never forwarded
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Shared state for the HTTP server
pub struct ServerState {
    pub worker: Arc<OfflineWorker>,
    pub handlers: HandlerTable,
    /// Origin-form requests are placed on this URL's origin
    pub scope: Url,
    /// Fired on shutdown to cancel fetches still in flight
    pub shutdown: AbortController,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(worker: Arc<OfflineWorker>, handlers: HandlerTable, scope: Url) -> Self {
        Self {
            worker,
            handlers,
            scope,
            shutdown: AbortController::new(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/__worker/health", get(health))
        .fallback(intercept)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(Arc::clone(&state));
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
}

/// Resolves on Ctrl-C after cancelling every in-flight fetch
async fn shutdown_signal(state: SharedState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down, cancelling in-flight fetches");
    state.shutdown.abort();
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        worker_state: state.worker.state().await,
        cache_name: state.worker.config().cache_name.clone(),
        uptime_secs,
        cache: state.worker.cache_stats().await,
    })
}

/// Dispatch an intercepted request as a fetch event.
///
/// If the client goes away, axum drops this future, which stops any cache
/// lookup or network fetch still in flight.
async fn intercept(State(state): State<SharedState>, request: Request) -> Response {
    let asset_request = match to_asset_request(&state.scope, request).await {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let url = asset_request.url.clone();
    let event = FetchEvent::new(asset_request).with_signal(state.shutdown.signal());

    match state.handlers.dispatch(WorkerEvent::Fetch(event)).await {
        Ok(EventOutcome::Response(response)) => {
            debug!(
                url = %url,
                status = response.status,
                source = response.source.as_str(),
                "Served request"
            );
            to_http_response(response)
        }
        Ok(other) => {
            ServerError::Internal(format!("fetch handler returned {:?}", other)).into_response()
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Fetch failed");
            ServerError::from(e).into_response()
        }
    }
}

/// URL an intercepted request targets. Absolute-form URIs are used as-is;
/// origin-form ones are placed on the scope's origin.
pub fn request_url(scope: &Url, uri: &Uri) -> Result<Url, ServerError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string())
            .map_err(|e| ServerError::BadRequest(format!("invalid request URI {}: {}", uri, e)));
    }

    let mut url = scope.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url.set_fragment(None);
    Ok(url)
}

async fn to_asset_request(scope: &Url, request: Request) -> Result<AssetRequest, ServerError> {
    let (parts, body) = request.into_parts();
    let url = request_url(scope, &parts.uri)?;

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ServerError::BadRequest(format!("cannot read request body: {}", e)))?;

    let mut asset_request = AssetRequest::new(parts.method.as_str(), url).with_body(body.to_vec());
    for (name, value) in parts.headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            asset_request = asset_request.with_header(name.as_str(), value);
        }
    }

    Ok(asset_request)
}

fn to_http_response(response: AssetResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let cache_header = match response.source {
        ResponseSource::Cache => "HIT",
        ResponseSource::Network => "MISS",
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    if response.header(header::VARY.as_str()).is_none() {
        builder = builder.header(header::VARY, "Accept-Encoding");
    }

    builder
        .header("X-Cache", cache_header)
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}
