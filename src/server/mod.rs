//! HTTP API.
//!
//! Routes:
//! - `GET /health`
//! - `POST /v1/resolve` with a platform descriptor body
//! - `POST /v1/resolve/batch` with a list of descriptors
//! - `GET /v1/search?q=...&kinds=song,album&limit=20`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{ItemKind, SearchResultItem};
use crate::identity_store::{PlatformDescriptor, UniversalTrackIdentity};
use crate::matching::ResolveError;
use crate::service::MatchingService;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 100;

struct ApiError(ResolveError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ResolveError::EmptyDescriptor => StatusCode::UNPROCESSABLE_ENTITY,
            ResolveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn resolve(
    State(service): State<Arc<MatchingService>>,
    Json(descriptor): Json<PlatformDescriptor>,
) -> Result<Json<UniversalTrackIdentity>, ApiError> {
    let identity = service.resolve_track(&descriptor).await?;
    Ok(Json(identity))
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
enum BatchEntry {
    Resolved { identity: UniversalTrackIdentity },
    Failed { error: String },
}

async fn resolve_batch(
    State(service): State<Arc<MatchingService>>,
    Json(descriptors): Json<Vec<PlatformDescriptor>>,
) -> Json<Vec<BatchEntry>> {
    let entries = service
        .resolve_batch(&descriptors)
        .await
        .into_iter()
        .map(|result| match result {
            Ok(identity) => BatchEntry::Resolved { identity },
            Err(e) => BatchEntry::Failed {
                error: e.to_string(),
            },
        })
        .collect();
    Json(entries)
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    limit: Option<usize>,
    /// Comma-separated kinds, e.g. "song,album". Unknown kinds are ignored.
    kinds: Option<String>,
}

fn parse_kinds(raw: Option<&str>) -> Vec<ItemKind> {
    raw.map(|s| s.split(',').filter_map(ItemKind::parse).collect())
        .unwrap_or_default()
}

async fn search(
    State(service): State<Arc<MatchingService>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<SearchResultItem>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let kinds = parse_kinds(params.kinds.as_deref());
    Json(service.search_unified(&params.q, &kinds, limit).await)
}

pub fn build_router(service: Arc<MatchingService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/resolve", post(resolve))
        .route("/v1/resolve/batch", post(resolve_batch))
        .route("/v1/search", get(search))
        .with_state(service)
}

pub async fn run_server(addr: SocketAddr, service: Arc<MatchingService>) -> Result<()> {
    let router = build_router(service);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "listening");
    axum::serve(listener, router)
        .await
        .context("server terminated")
}
