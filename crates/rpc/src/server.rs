use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fileswarm_p2p::Retriever;
use fileswarm_store::{FileStore, StoreError};
use fileswarm_types::{FileName, RetrievalOutcome};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FileStore>,
    pub retriever: Retriever,
    pub node_id: String,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
}

impl AppState {
    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    uptime_secs: u64,
    peer_count: usize,
    req_total: u64,
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    axum::serve(listener, app)
        .await
        .context("file server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;
    info!(addr = %listener.local_addr()?, "file node listening");
    Ok(listener)
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/:name", get(handle_probe_local))
        .route("/:name", get(handle_get_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let req_total = state.record_request();
    Json(HealthResponse {
        status: "ok",
        node_id: state.node_id.clone(),
        uptime_secs: state.uptime_seconds(),
        peer_count: state.retriever.registry().len(),
        req_total,
    })
}

/// GET /{name}: serve a file, falling back to peers on a local miss.
async fn handle_get_file(
    State(state): State<SharedState>,
    AxumPath(raw_name): AxumPath<String>,
) -> Response {
    state.record_request();

    let name = match FileName::new(raw_name) {
        Ok(name) => name,
        Err(err) => {
            debug!(error = %err, "rejected file request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.retriever.lookup(&name).await {
        RetrievalOutcome::Hit(bytes) | RetrievalOutcome::Fetched(bytes) => file_response(bytes),
        RetrievalOutcome::Miss => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /api/{name}: decimal byte size of a locally held file.
///
/// This is the probe target peers call on us; it is purely local and
/// must never recurse into fallback fetching.
async fn handle_probe_local(
    State(state): State<SharedState>,
    AxumPath(raw_name): AxumPath<String>,
) -> Response {
    state.record_request();

    let name = match FileName::new(raw_name) {
        Ok(name) => name,
        Err(err) => {
            debug!(error = %err, "rejected probe request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.store.size(&name).await {
        Ok(size) => size.to_string().into_response(),
        Err(StoreError::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!(%name, error = %err, "size lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn file_response(bytes: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(bytes));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    response
}
