//! HTTP surface for askdocs.
//!
//! This module exposes a compact Axum router over the ingestion and query
//! services:
//!
//! - `POST /documents` – Upload a batch of files; per-file validation failures
//!   are reported alongside accepted documents instead of aborting the batch.
//! - `GET /documents` / `GET /documents/:id` / `DELETE /documents/:id` –
//!   Inspect and remove lifecycle records; the list view omits extracted text.
//! - `POST /documents/:id/process` – Run the embedding pipeline for one
//!   document awaiting it.
//! - `POST /process` – Sweep every document in the `embedding` state, with an
//!   optional embedding batch-size override.
//! - `POST /chat` – Answer a question with citations, or the fixed refusal.
//! - `POST /search` – Ranked chunk matches with snippets, no generation.
//! - `POST /maintenance/stuck` – Force-fail documents stuck in flight.
//! - `GET /metrics` – Ingestion and query counters.
//!
//! Unexpected failures are converted into structured JSON error responses
//! rather than propagating raw errors to the transport.

use crate::{
    chat::{ChatAnswer, ChatError, ChatRequest, ChatTurn, QueryApi},
    documents::{DocumentRecord, DocumentSummary, StoreError},
    processing::{
        BatchUploadOutcome, DocumentsApi, ProcessingError, ProcessingOutcome, SweepOutcome,
        UploadFile,
    },
    qdrant::SearchFilterArgs,
    retrieval::{RetrievalError, SearchHit},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Default number of sources requested when the caller omits `k`.
const DEFAULT_K: usize = 5;

/// Shared handles to the ingestion and query services.
#[derive(Clone)]
pub struct AppState {
    /// Ingestion surface.
    pub documents: Arc<dyn DocumentsApi>,
    /// Query surface.
    pub query: Arc<dyn QueryApi>,
}

/// Build the HTTP router exposing the service API surface.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/documents", post(upload_documents).get(list_documents))
        .route(
            "/documents/:id",
            get(get_document).delete(delete_document),
        )
        .route("/documents/:id/process", post(process_document))
        .route("/process", post(sweep_pending))
        .route("/chat", post(chat))
        .route("/search", post(search))
        .route("/maintenance/stuck", post(sweep_stuck))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

/// One file in a `POST /documents` request.
#[derive(Deserialize)]
struct UploadFileRequest {
    /// Original filename including extension.
    filename: String,
    /// File contents as text.
    content: String,
    /// Optional opaque metadata stored on the record.
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// Request body for `POST /documents`.
#[derive(Deserialize)]
struct UploadRequest {
    files: Vec<UploadFileRequest>,
}

/// Upload a batch of documents; failures are isolated per file.
async fn upload_documents(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Json<BatchUploadOutcome> {
    let files: Vec<UploadFile> = request
        .files
        .into_iter()
        .map(|file| UploadFile {
            filename: file.filename,
            content: file.content.into_bytes(),
            metadata: file.metadata,
        })
        .collect();
    let outcome = state.documents.upload(files).await;
    Json(outcome)
}

/// Response body for `GET /documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentSummary>,
}

/// List document summaries, newest first.
async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = state.documents.list_documents().await?;
    Ok(Json(DocumentsResponse { documents }))
}

/// Fetch one document record, including extracted content.
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentRecord>, AppError> {
    let record = state.documents.get_document(&id).await?;
    Ok(Json(record))
}

/// Delete a document record and its indexed vectors.
async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentSummary>, AppError> {
    let removed = state.documents.delete_document(&id).await?;
    Ok(Json(removed))
}

/// Trigger the embedding pipeline for one document.
async fn process_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<SweepRequest>>,
) -> Result<Json<ProcessingOutcome>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let outcome = state
        .documents
        .process_document(&id, request.batch_size)
        .await?;
    Ok(Json(outcome))
}

/// Optional body for the processing triggers.
#[derive(Deserialize, Default)]
struct SweepRequest {
    /// Embedding batch-size override for this run.
    #[serde(default)]
    batch_size: Option<usize>,
}

/// Sweep every document currently awaiting embedding.
async fn sweep_pending(
    State(state): State<AppState>,
    body: Option<Json<SweepRequest>>,
) -> Result<Json<SweepOutcome>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let outcome = state.documents.sweep_pending(request.batch_size).await?;
    Ok(Json(outcome))
}

/// Response body for `POST /maintenance/stuck`.
#[derive(Serialize)]
struct StuckSweepResponse {
    /// Identifiers of documents force-failed by this sweep.
    failed_documents: Vec<String>,
}

/// Force-fail documents stuck in flight beyond the staleness threshold.
async fn sweep_stuck(
    State(state): State<AppState>,
) -> Result<Json<StuckSweepResponse>, AppError> {
    let failed_documents = state.documents.sweep_stuck().await?;
    Ok(Json(StuckSweepResponse { failed_documents }))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequestBody {
    /// Natural-language question.
    question: String,
    /// Number of sources requested (defaults to 5).
    #[serde(default)]
    k: Option<usize>,
    /// Optional allow-list of document ids to search.
    #[serde(default)]
    document_ids: Option<Vec<String>>,
    /// Optional allow-list of file types to search.
    #[serde(default)]
    file_types: Option<Vec<String>>,
    /// Prior conversation turns, oldest first.
    #[serde(default)]
    history: Vec<ChatTurn>,
}

/// Answer a question against the index.
async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatAnswer>, AppError> {
    let request = ChatRequest {
        question: body.question,
        k: body.k.unwrap_or(DEFAULT_K),
        filters: SearchFilterArgs {
            document_ids: body.document_ids,
            file_types: body.file_types,
        },
        history: body.history,
    };
    let answer = state.query.chat(request).await?;
    Ok(Json(answer))
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequestBody {
    /// Query text.
    query: String,
    /// Number of matches requested (defaults to 5).
    #[serde(default)]
    k: Option<usize>,
    /// Optional allow-list of document ids to search.
    #[serde(default)]
    document_ids: Option<Vec<String>>,
    /// Optional allow-list of file types to search.
    #[serde(default)]
    file_types: Option<Vec<String>>,
}

/// Response body for `POST /search`.
#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

/// Rank chunks for a query, without generation.
async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchRequestBody>,
) -> Result<Json<SearchResponse>, AppError> {
    let filters = SearchFilterArgs {
        document_ids: body.document_ids,
        file_types: body.file_types,
    };
    let results = state
        .query
        .search(&body.query, body.k.unwrap_or(DEFAULT_K), &filters)
        .await?;
    Ok(Json(SearchResponse { results }))
}

/// Return ingestion and query counters.
async fn get_metrics(State(state): State<AppState>) -> Json<crate::metrics::MetricsSnapshot> {
    Json(state.documents.metrics_snapshot())
}

/// Error wrapper converting service failures into structured JSON responses.
enum AppError {
    Processing(ProcessingError),
    Retrieval(RetrievalError),
    Chat(ChatError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Processing(ProcessingError::Store(StoreError::NotFound { .. })) => {
                StatusCode::NOT_FOUND
            }
            Self::Processing(ProcessingError::Store(StoreError::StatusConflict { .. }))
            | Self::Processing(ProcessingError::NotEligible { .. }) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Processing(error) => error.to_string(),
            Self::Retrieval(error) => error.to_string(),
            Self::Chat(error) => error.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "Request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}

impl From<RetrievalError> for AppError {
    fn from(inner: RetrievalError) -> Self {
        Self::Retrieval(inner)
    }
}

impl From<ChatError> for AppError {
    fn from(inner: ChatError) -> Self {
        Self::Chat(inner)
    }
}
