//! Document processing pipeline: lifecycle orchestration, chunking, embedding,
//! and vector indexing.

pub mod chunking;
mod service;
pub mod types;

pub use chunking::{CHARS_PER_TOKEN, TextChunk, chunk_text};
pub use service::{DocumentsApi, IngestionService};
pub use types::{
    BatchUploadOutcome, ChunkingError, ProcessingError, ProcessingOutcome, SweepFailure,
    SweepOutcome, UploadFailure, UploadFile, ValidationError,
};
