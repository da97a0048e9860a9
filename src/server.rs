//! HTTP API for index synchronization and search.
//!
//! # Endpoints
//!
//! | Method   | Path           | Description |
//! |----------|----------------|-------------|
//! | `POST`   | `/index`       | Fetch one service row by id and upsert its document |
//! | `DELETE` | `/index/{id}`  | Remove one document from the index |
//! | `GET`    | `/search`      | Query the index with filters and pagination |
//! | `GET`    | `/suggest`     | Title typeahead for a prefix |
//! | `GET`    | `/health`      | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry a stable machine-readable kind and a
//! human-readable message, never a raw dependency error chain:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no active service with id ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `dependency_unavailable` (502), `internal` (500). Search and suggest are
//! availability-critical and never fail on engine errors — they degrade to
//! empty results instead.
//!
//! # Startup
//!
//! The server refuses traffic until the collection exists: pool connect →
//! collection bootstrap (retried, fatal on exhaustion) → synonym sync
//! (non-fatal) → bind.

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::{DeleteOutcome, EngineClient, EngineError};
use crate::indexer::{self, IndexOutcome};
use crate::models::{IndexReceipt, SearchFilters, SearchResponse, SuggestResponse};
use crate::retry::RetryPolicy;
use crate::search;
use crate::store::{self, PgRecordStore};
use crate::synonyms;

/// Shared application state. The pool and engine client are the only
/// process-wide resources; both are safe for concurrent use.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<PgRecordStore>,
    engine: Arc<EngineClient>,
}

/// Starts the HTTP service. Runs the startup sequence first and only then
/// binds — search against a missing collection is a hard failure.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = store::connect(config).await.context("database connect failed")?;
    let engine = EngineClient::new(&config.engine)?;

    let policy = RetryPolicy::new(
        config.engine.bootstrap_max_attempts,
        Duration::from_secs(config.engine.bootstrap_retry_secs),
    );
    engine
        .bootstrap(&policy)
        .await
        .context("collection bootstrap failed; refusing to serve")?;

    let record_store = PgRecordStore::new(pool.clone());

    // Synonym expansion is a degraded-mode feature; its failure never blocks
    // startup.
    match synonyms::sync_synonyms(&record_store, &engine).await {
        Ok(summary) if summary.failed > 0 => tracing::warn!(
            groups = summary.groups,
            failed = summary.failed,
            "synonym sync completed partially"
        ),
        Ok(summary) => tracing::info!(groups = summary.groups, "synonym sync complete"),
        Err(err) => {
            tracing::error!(error = %err, "synonym sync failed; continuing without refresh")
        }
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(record_store),
        engine: Arc::new(engine),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/index", post(handle_index))
        .route("/index/{id}", delete(handle_delete))
        .route("/search", get(handle_search))
        .route("/suggest", get(handle_suggest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(bind = %config.server.bind, "search service listening");

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    pool.close().await;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "dependency_unavailable".to_string(),
        message: message.into(),
    }
}

/// Maps mutation-path failures to responses: a validation rejection from
/// the gateway is the caller's fault (400); anything else is a dependency
/// failure (502).
fn classify_mutation_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Validation(msg)) => bad_request(msg.clone()),
        _ => unavailable(err.to_string()),
    }
}

// ============ POST /index ============

#[derive(Deserialize)]
struct IndexRequest {
    id: Uuid,
}

async fn handle_index(
    State(state): State<AppState>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexReceipt>, AppError> {
    match indexer::index_service(state.store.as_ref(), &state.engine, request.id).await {
        Ok(IndexOutcome::Indexed(id)) => Ok(Json(IndexReceipt {
            success: true,
            id,
            message: "service indexed".to_string(),
        })),
        Ok(IndexOutcome::NotFound) => Err(not_found(format!(
            "no active service with id {}",
            request.id
        ))),
        Err(err) => {
            tracing::error!(id = %request.id, error = %err, "indexing failed");
            Err(classify_mutation_error(err))
        }
    }
}

// ============ DELETE /index/{id} ============

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IndexReceipt>, AppError> {
    match indexer::remove_service(&state.engine, id).await {
        Ok(DeleteOutcome::Deleted) => Ok(Json(IndexReceipt {
            success: true,
            id: id.to_string(),
            message: "service removed from index".to_string(),
        })),
        Ok(DeleteOutcome::NotFound) => {
            Err(not_found(format!("service {} is not indexed", id)))
        }
        Err(err) => {
            tracing::error!(%id, error = %err, "delete failed");
            Err(classify_mutation_error(err))
        }
    }
}

// ============ GET /search ============

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    page: Option<i64>,
    page_size: Option<i64>,
    category: Option<String>,
    location: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("q must not be empty"));
    }

    let filters = SearchFilters {
        category: params.category,
        location: params.location,
        min_price: params.min_price,
        max_price: params.max_price,
    };

    let response = search::search_services(
        &state.engine,
        &state.config,
        &params.q,
        params.page,
        params.page_size,
        &filters,
    )
    .await;

    Ok(Json(response))
}

// ============ GET /suggest ============

#[derive(Debug, Deserialize)]
struct SuggestQuery {
    q: String,
    limit: Option<i64>,
}

async fn handle_suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestQuery>,
) -> Json<SuggestResponse> {
    Json(search::suggest_titles(&state.engine, &state.config, &params.q, params.limit).await)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
