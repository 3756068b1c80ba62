//! Shared types used by the Qdrant client and helpers.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Payload stored alongside each chunk vector.
///
/// Everything retrieval needs to cite a passage lives here, so query results
/// never require a second lookup against the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Identifier of the owning document.
    pub document_id: String,
    /// Original filename, surfaced in citations.
    pub filename: String,
    /// Lowercased file extension, filterable.
    pub file_type: String,
    /// Document upload timestamp in RFC 3339.
    pub upload_date: String,
    /// Zero-based chunk position within the document.
    pub chunk_index: usize,
    /// Full chunk text.
    pub text: String,
}

/// Prepared point ready for indexing.
///
/// The id is a deterministic function of `(document_id, chunk_index)` (see
/// [`crate::qdrant::point::chunk_point_id`]), so re-indexing a document
/// overwrites its previous vectors instead of duplicating them.
#[derive(Debug, Clone)]
pub struct PointInsert {
    /// Deterministic point identifier.
    pub id: String,
    /// Embedding vector produced for the chunk.
    pub vector: Vec<f32>,
    /// Citation payload stored with the vector.
    pub payload: ChunkPayload,
}

/// Filters that can be applied to Qdrant search queries.
///
/// Each list is an allow-list with `$in` semantics: a point matches when the
/// field's value is a member of the set. An absent list applies no
/// restriction.
#[derive(Debug, Default, Clone)]
pub struct SearchFilterArgs {
    /// Allow-list for the `document_id` payload field.
    pub document_ids: Option<Vec<String>>,
    /// Allow-list for the `file_type` payload field.
    pub file_types: Option<Vec<String>>,
}

impl SearchFilterArgs {
    /// Whether the filter imposes no restriction at all.
    pub fn is_empty(&self) -> bool {
        self.document_ids.is_none() && self.file_types.is_none()
    }
}

/// Scored payload returned by Qdrant queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Similarity score computed by Qdrant; higher is closer.
    pub score: f32,
    /// Chunk payload associated with the vector, when present and well formed.
    pub payload: Option<ChunkPayload>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Value>,
}
