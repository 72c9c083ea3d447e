//! Guideline editing HTTP server.
//!
//! Exposes the guideline store as a small JSON API so guidelines can be
//! listed, added, edited, and removed without touching the file by hand.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/guidelines` | List all guidelines |
//! | `POST`   | `/guidelines` | Add a guideline; the id is assigned (`G001`, `G002`, ...) |
//! | `GET`    | `/guidelines/{id}` | Fetch one guideline |
//! | `PUT`    | `/guidelines/{id}` | Replace a guideline's fields, keeping its id |
//! | `DELETE` | `/guidelines/{id}` | Remove a guideline |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no guideline with id G042" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser-based
//! editor can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use creview_core::models::GuidelineRecord;
use creview_core::store::{GuidelineDraft, GuidelineStore};
use creview_core::ReviewError;

use crate::config::Config;
use crate::guidelines::JsonGuidelineStore;

/// Shared state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn GuidelineStore>,
}

/// Starts the guideline server on `[server].bind` over the configured
/// guideline file. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn GuidelineStore> =
        Arc::new(JsonGuidelineStore::new(config.guidelines.path.clone()));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        guidelines = %config.guidelines.path.display(),
        "guideline server listening"
    );
    println!("Guideline server listening on http://{}", config.server.bind);
    serve(listener, store).await
}

/// Serve the API on an already-bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    store: Arc<dyn GuidelineStore>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(store)).await?;
    Ok(())
}

/// Build the API router over `store`.
pub fn router(store: Arc<dyn GuidelineStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/guidelines", get(handle_list).post(handle_add))
        .route(
            "/guidelines/{id}",
            get(handle_get).put(handle_update).delete(handle_delete),
        )
        .layer(cors)
        .with_state(AppState { store })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(id: &str) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: format!("no guideline with id {}", id),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        tracing::error!(error = %err, "guideline store failure");
        internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

/// Run a store operation off the async runtime; store I/O is blocking.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&dyn GuidelineStore) -> creview_core::Result<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| internal(format!("store task failed: {}", e)))?
        .map_err(AppError::from)
}

fn validated(draft: GuidelineDraft) -> Result<GuidelineDraft, AppError> {
    draft.validate().map_err(bad_request)?;
    Ok(draft)
}

// ============ Handlers ============

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

#[derive(Serialize)]
struct GuidelineList {
    guidelines: Vec<GuidelineRecord>,
}

async fn handle_list(State(state): State<AppState>) -> Result<Json<GuidelineList>, AppError> {
    let guidelines = with_store(&state, |s| s.load_all()).await?;
    Ok(Json(GuidelineList { guidelines }))
}

async fn handle_add(
    State(state): State<AppState>,
    body: Result<Json<GuidelineDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<GuidelineRecord>), AppError> {
    let Json(draft) = body?;
    let draft = validated(draft)?;
    let record = with_store(&state, move |s| s.add(draft)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GuidelineRecord>, AppError> {
    let lookup = id.clone();
    with_store(&state, move |s| s.get(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<GuidelineDraft>, JsonRejection>,
) -> Result<Json<GuidelineRecord>, AppError> {
    let Json(draft) = body?;
    let draft = validated(draft)?;
    let target = id.clone();
    with_store(&state, move |s| s.update(&target, draft))
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = id.clone();
    if with_store(&state, move |s| s.delete(&target)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}
