//! Semantic retrieval and context packing.
//!
//! The retrieval engine embeds a question with the same provider and model as
//! ingestion, queries the vector index with optional allow-list filters, and
//! either packs the best matches into a citation-indexed context or reports
//! that the index holds nothing relevant enough to ground an answer.

pub mod snippet;

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, EmbeddingClientError, get_embedding_client},
    qdrant::{QdrantError, ScoredPoint, SearchFilterArgs, VectorIndex},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Minimum similarity score of the best match required to attempt an answer.
pub const MIN_SCORE: f32 = 0.15;

/// Character budget for the packed context handed to generation.
pub const CONTEXT_CHAR_BUDGET: usize = 2400;

/// Character radius of citation snippets around a matched query term.
pub const SNIPPET_RADIUS: usize = 200;

/// Minimum number of candidates fetched from the index, regardless of `k`,
/// to leave room for downstream trimming.
const MIN_CANDIDATES: usize = 8;

/// Errors emitted while orchestrating similarity searches.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Embedding provider failed to return vectors for the query text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index query returned an error response.
    #[error("Vector index request failed: {0}")]
    Index(#[from] QdrantError),
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured on the server.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
}

/// Citation surfaced to the caller alongside a generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSource {
    /// Identifier of the cited document.
    pub document_id: String,
    /// Filename of the cited document.
    pub filename: String,
    /// Zero-based chunk position within the document.
    pub chunk_index: usize,
    /// Query-aware excerpt of the cited chunk.
    pub snippet: String,
    /// Similarity score of the underlying match.
    pub score: f32,
    /// One-based index matching the `[n]` markers in the packed context.
    pub citation_index: usize,
}

/// Ranked match returned by the plain search surface.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Identifier of the matched document.
    pub document_id: String,
    /// Filename of the matched document.
    pub filename: String,
    /// File type of the matched document.
    pub file_type: String,
    /// Zero-based chunk position within the document.
    pub chunk_index: usize,
    /// Similarity score; higher is closer.
    pub score: f32,
    /// Query-aware excerpt of the matched chunk.
    pub snippet: String,
}

/// Context packed for generation, with its citation sources in order.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    /// Sources in packing order; `citation_index` is 1-based and contiguous.
    pub sources: Vec<ChatSource>,
    /// Newline-separated `[n] <filename> (chunk <i>): <snippet>` records.
    pub context: String,
}

/// Result of a retrieval attempt.
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    /// Enough relevant material was found; generation may proceed.
    Grounded(RetrievedContext),
    /// Nothing similar enough was found; generation must be skipped.
    Insufficient,
}

/// Embeds queries and turns vector index matches into packed context.
pub struct RetrievalEngine {
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    index: Arc<dyn VectorIndex>,
    dimension: usize,
}

impl RetrievalEngine {
    /// Build an engine from configuration, sharing the given index handle.
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        let config = get_config();
        Self {
            embedding_client: get_embedding_client(),
            index,
            dimension: config.embedding_dimension,
        }
    }

    /// Assemble an engine from explicit components.
    pub fn with_components(
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
        index: Arc<dyn VectorIndex>,
        dimension: usize,
    ) -> Self {
        Self {
            embedding_client,
            index,
            dimension,
        }
    }

    /// Retrieve matches for a question and pack them for generation.
    ///
    /// Fetches more candidates than requested (`max(k, 8)`) and applies the
    /// confidence gate before any context is assembled: zero matches, or a
    /// best score under [`MIN_SCORE`], short-circuits to
    /// [`RetrievalOutcome::Insufficient`].
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilterArgs,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let vector = self.embed_query(query).await?;
        let top_k = k.max(MIN_CANDIDATES);
        let matches = self.index.query(vector, top_k, filters).await?;

        let best = matches.first().map(|point| point.score);
        match best {
            Some(score) if score >= MIN_SCORE => {}
            _ => {
                tracing::debug!(
                    best_score = ?best,
                    candidates = matches.len(),
                    "Confidence gate rejected query"
                );
                return Ok(RetrievalOutcome::Insufficient);
            }
        }

        Ok(RetrievalOutcome::Grounded(pack_context(query, matches)))
    }

    /// Rank chunks for a query without gating or packing.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilterArgs,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let vector = self.embed_query(query).await?;
        let matches = self.index.query(vector, k.max(1), filters).await?;

        Ok(matches
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                Some(SearchHit {
                    snippet: snippet::extract_snippet(&payload.text, query, SNIPPET_RADIUS),
                    document_id: payload.document_id,
                    filename: payload.filename,
                    file_type: payload.file_type,
                    chunk_index: payload.chunk_index,
                    score: point.score,
                })
            })
            .collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(RetrievalError::EmptyEmbedding)?;

        if vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

/// Pack matches into citation records under the context character budget.
///
/// Matches arrive in descending-score order and are consumed in that order;
/// packing stops at the first record that would overflow the budget.
fn pack_context(query: &str, matches: Vec<ScoredPoint>) -> RetrievedContext {
    let mut packed = RetrievedContext::default();

    for point in matches {
        let Some(payload) = point.payload else {
            continue;
        };
        let citation_index = packed.sources.len() + 1;
        let snippet = snippet::extract_snippet(&payload.text, query, SNIPPET_RADIUS);
        let line = format!(
            "[{citation_index}] {} (chunk {}): {snippet}",
            payload.filename, payload.chunk_index
        );

        let separator = usize::from(!packed.context.is_empty());
        if packed.context.len() + separator + line.len() > CONTEXT_CHAR_BUDGET {
            break;
        }
        if separator == 1 {
            packed.context.push('\n');
        }
        packed.context.push_str(&line);
        packed.sources.push(ChatSource {
            document_id: payload.document_id,
            filename: payload.filename,
            chunk_index: payload.chunk_index,
            snippet,
            score: point.score,
            citation_index,
        });
    }

    packed
}
