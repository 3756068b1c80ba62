#![deny(missing_docs)]

//! Core library for the askdocs document Q&A service.

/// HTTP routing and REST handlers.
pub mod api;
/// Answer composition on top of retrieval results.
pub mod chat;
/// Completion client abstraction and adapters.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Document records, lifecycle store, and content extraction.
pub mod documents;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and query metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Qdrant vector index integration.
pub mod qdrant;
/// Semantic retrieval and context packing.
pub mod retrieval;
