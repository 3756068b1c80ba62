//! Qdrant vector index integration.

pub mod client;
pub mod filters;
pub mod point;
pub mod types;

use async_trait::async_trait;

pub use client::QdrantService;
pub use filters::{build_search_filter, document_filter};
pub use point::chunk_point_id;
pub use types::{ChunkPayload, PointInsert, QdrantError, ScoredPoint, SearchFilterArgs};

/// Vector index contract consumed by the ingestion pipeline and the retrieval
/// engine.
///
/// The index is a black box: upserts are durable and idempotent keyed by point
/// id, and queries return matches ordered by descending similarity score.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Prepare the backing collection for vectors of the given size.
    async fn ensure_ready(&self, vector_size: u64) -> Result<(), QdrantError>;

    /// Insert or overwrite the given points.
    async fn upsert(&self, points: Vec<PointInsert>) -> Result<(), QdrantError>;

    /// Return up to `top_k` nearest points, optionally restricted by filters,
    /// ordered by descending score.
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &SearchFilterArgs,
    ) -> Result<Vec<ScoredPoint>, QdrantError>;

    /// Remove every vector belonging to one document.
    async fn delete_document(&self, document_id: &str) -> Result<(), QdrantError>;
}
