//! Core data types for document lifecycle records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of an uploaded document.
///
/// Normal flow is `Uploading → Extracting → Embedding → Completed`; `Error` is
/// reachable from any non-terminal state. `Completed` and `Error` are terminal:
/// no normal processing call mutates a document once it reaches either.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Upload accepted, raw bytes not yet validated.
    Uploading,
    /// Content extraction in progress.
    Extracting,
    /// Chunking, embedding, and indexing in progress.
    Embedding,
    /// All vectors indexed; `chunk_count` is set.
    Completed,
    /// Processing failed; `error_message` records the cause.
    Error,
}

impl ProcessingStatus {
    /// Whether the state accepts no further transitions under normal operation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether the document is waiting on a processing step to finish.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Extracting | Self::Embedding)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Uploading => "uploading",
            Self::Extracting => "extracting",
            Self::Embedding => "embedding",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Identity and lifecycle of one uploaded document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable unique identifier assigned at upload.
    pub id: String,
    /// Original filename supplied by the uploader.
    pub filename: String,
    /// Lowercased file extension, e.g. `txt` or `md`.
    pub file_type: String,
    /// Size of the uploaded payload in bytes.
    pub file_size: u64,
    /// Creation timestamp; immutable after insert.
    #[serde(with = "time::serde::rfc3339")]
    pub upload_date: OffsetDateTime,
    /// Current lifecycle state.
    pub status: ProcessingStatus,
    /// Text produced by the extractor; set once per processing attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
    /// Number of chunks indexed; set only when `status` is `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    /// Failure cause; set only when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Opaque caller-supplied metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl DocumentRecord {
    /// Create a fresh record in the `Extracting` state with a generated id.
    pub fn new(
        filename: String,
        file_type: String,
        file_size: u64,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename,
            file_type,
            file_size,
            upload_date: OffsetDateTime::now_utc(),
            status: ProcessingStatus::Extracting,
            extracted_content: None,
            chunk_count: None,
            error_message: None,
            metadata,
        }
    }

    /// View of the record without the (potentially large) extracted text.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            file_type: self.file_type.clone(),
            file_size: self.file_size,
            upload_date: self.upload_date,
            status: self.status,
            chunk_count: self.chunk_count,
            error_message: self.error_message.clone(),
        }
    }
}

/// List-view projection of a [`DocumentRecord`], omitting extracted content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Stable unique identifier.
    pub id: String,
    /// Original filename.
    pub filename: String,
    /// Lowercased file extension.
    pub file_type: String,
    /// Upload size in bytes.
    pub file_size: u64,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub upload_date: OffsetDateTime,
    /// Current lifecycle state.
    pub status: ProcessingStatus,
    /// Chunk count, present only for completed documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    /// Failure cause, present only for errored documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Partial update applied to a record with merge semantics.
///
/// Fields left as `None` are preserved; `Some` values overwrite.
#[derive(Clone, Debug, Default)]
pub struct DocumentPatch {
    /// New lifecycle state.
    pub status: Option<ProcessingStatus>,
    /// Extracted text to attach.
    pub extracted_content: Option<String>,
    /// Chunk count recorded on successful indexing.
    pub chunk_count: Option<usize>,
    /// Failure cause recorded alongside the `Error` state.
    pub error_message: Option<String>,
}

impl DocumentPatch {
    /// Patch moving a document to a new status without touching other fields.
    pub fn status(status: ProcessingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch marking a document as failed with the given cause.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some(ProcessingStatus::Error),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Patch marking a document as completed with its final chunk count.
    pub fn completed(chunk_count: usize) -> Self {
        Self {
            status: Some(ProcessingStatus::Completed),
            chunk_count: Some(chunk_count),
            ..Self::default()
        }
    }

    /// Apply the patch to a record in place.
    pub(crate) fn apply(&self, record: &mut DocumentRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(content) = &self.extracted_content {
            record.extracted_content = Some(content.clone());
        }
        if let Some(count) = self.chunk_count {
            record.chunk_count = Some(count);
        }
        if let Some(message) = &self.error_message {
            record.error_message = Some(message.clone());
        }
    }
}

/// Errors raised by document store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the requested id.
    #[error("document not found: {id}")]
    NotFound {
        /// Identifier that failed to resolve.
        id: String,
    },
    /// Insert collided with an existing record.
    #[error("document already exists: {id}")]
    AlreadyExists {
        /// Identifier that collided.
        id: String,
    },
    /// A guarded transition found the record in an unexpected state.
    #[error("document {id} is in state '{actual}', which does not permit this transition")]
    StatusConflict {
        /// Identifier of the contested record.
        id: String,
        /// State the record was actually in.
        actual: ProcessingStatus,
    },
    /// Backend-specific failure.
    #[error("document store backend error: {0}")]
    Backend(String),
}
