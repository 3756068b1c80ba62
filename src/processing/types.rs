//! Core data types and error definitions for the processing pipeline.

use crate::{
    documents::{DocumentSummary, ExtractionError, ProcessingStatus, StoreError},
    embedding::EmbeddingClientError,
    qdrant::QdrantError,
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors rejecting an individual uploaded file.
///
/// Validation failures are surfaced per file and never abort the rest of a
/// batch upload.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Filename carried no usable extension.
    #[error("filename has no extension")]
    MissingExtension,
    /// File type is not on the accepted list.
    #[error("unsupported file type '{file_type}'")]
    UnsupportedType {
        /// The rejected extension.
        file_type: String,
    },
    /// Upload exceeds the configured size cap.
    #[error("file size {size} exceeds the {max} byte limit")]
    TooLarge {
        /// Size of the rejected upload.
        size: u64,
        /// Configured maximum.
        max: u64,
    },
    /// Upload contained no bytes.
    #[error("file is empty")]
    EmptyFile,
}

/// Errors emitted by the document processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Document reached the pipeline without extracted content.
    #[error("document {id} has no extracted content")]
    EmptyDocument {
        /// Identifier of the offending document.
        id: String,
    },
    /// Extracted content produced no chunks.
    #[error("document {id} produced no chunks")]
    NoChunks {
        /// Identifier of the offending document.
        id: String,
    },
    /// Document is not in a state that permits processing.
    #[error("document {id} is in state '{status}' and cannot be processed")]
    NotEligible {
        /// Identifier of the offending document.
        id: String,
        /// State the document was found in.
        status: ProcessingStatus,
    },
    /// Content extraction failed.
    #[error("Failed to extract content: {0}")]
    Extraction(#[from] ExtractionError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index interaction failed during ingestion.
    #[error("Vector index request failed: {0}")]
    Index(#[from] QdrantError),
    /// Document store interaction failed.
    #[error("Document store request failed: {0}")]
    Store(#[from] StoreError),
}

/// One file submitted in a batch upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original filename including extension.
    pub filename: String,
    /// Raw file bytes.
    pub content: Vec<u8>,
    /// Opaque caller metadata attached to the resulting record.
    pub metadata: Map<String, Value>,
}

/// Per-file failure reported back from a batch upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    /// Filename of the rejected or failed upload.
    pub filename: String,
    /// Human-readable cause.
    pub error: String,
}

/// Result of a batch upload: successes and failures side by side.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BatchUploadOutcome {
    /// Documents accepted and processed, in submission order.
    pub documents: Vec<DocumentSummary>,
    /// Files rejected by validation or failed during processing.
    pub errors: Vec<UploadFailure>,
}

/// Summary of one successfully indexed document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    /// Identifier of the processed document.
    pub document_id: String,
    /// Number of chunks indexed for the document.
    pub chunk_count: usize,
}

/// Per-document failure reported from a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    /// Identifier of the failed document.
    pub document_id: String,
    /// Human-readable cause.
    pub error: String,
}

/// Result of sweeping every document awaiting embedding.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SweepOutcome {
    /// Documents indexed to completion.
    pub processed: Vec<ProcessingOutcome>,
    /// Documents that ended in the error state, with causes.
    pub failed: Vec<SweepFailure>,
}
