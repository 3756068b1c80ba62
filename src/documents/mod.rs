//! Document records, lifecycle storage, and content extraction.

pub mod extract;
pub mod store;
pub mod types;

pub use extract::{ContentExtractor, ExtractedText, ExtractionError, PlainTextExtractor};
pub use store::{DocumentStore, InMemoryDocumentStore};
pub use types::{DocumentPatch, DocumentRecord, DocumentSummary, ProcessingStatus, StoreError};
