//! Ingestion service coordinating the document lifecycle, chunking, embedding,
//! and vector index writes.
//!
//! Per-document processing is strictly sequential (extract → chunk → embed →
//! index); across documents the service fans out without shared state beyond
//! the document store, whose compare-and-swap `transition` keeps racing
//! triggers from overwriting each other's status writes.

use crate::{
    config::get_config,
    documents::{
        ContentExtractor, DocumentPatch, DocumentRecord, DocumentStore, DocumentSummary,
        InMemoryDocumentStore, PlainTextExtractor, ProcessingStatus, StoreError,
    },
    embedding::{EmbeddingClient, get_embedding_client},
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::{
        chunking::chunk_text,
        types::{
            BatchUploadOutcome, ProcessingError, ProcessingOutcome, SweepFailure, SweepOutcome,
            UploadFailure, UploadFile, ValidationError,
        },
    },
    qdrant::{ChunkPayload, PointInsert, VectorIndex, chunk_point_id},
};
use async_trait::async_trait;
use futures_util::{StreamExt, future, stream};
use std::sync::Arc;
use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};

/// Upper bound on documents processed concurrently during a sweep.
const SWEEP_CONCURRENCY: usize = 4;

/// File types accepted at upload. Extraction support for the non-text kinds
/// comes from the pluggable [`ContentExtractor`].
const ALLOWED_FILE_TYPES: [&str; 13] = [
    "txt", "md", "markdown", "csv", "json", "log", "html", "pdf", "docx", "xlsx", "png", "jpg",
    "jpeg",
];

/// Coordinates the full ingestion pipeline for uploaded documents.
///
/// The service owns long-lived handles to the document store, extractor,
/// embedding client, vector index, and metrics registry so that every surface
/// shares the same components. Construct it once near process start and share
/// it through an `Arc`.
pub struct IngestionService {
    store: Arc<dyn DocumentStore>,
    extractor: Box<dyn ContentExtractor>,
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    index: Arc<dyn VectorIndex>,
    metrics: Arc<ServiceMetrics>,
}

/// Abstraction over the ingestion surface used by external transports.
#[async_trait]
pub trait DocumentsApi: Send + Sync {
    /// Validate, extract, and index a batch of uploaded files.
    async fn upload(&self, files: Vec<UploadFile>) -> BatchUploadOutcome;

    /// Run the embedding pipeline for one document currently awaiting it.
    async fn process_document(
        &self,
        id: &str,
        batch_size: Option<usize>,
    ) -> Result<ProcessingOutcome, ProcessingError>;

    /// Run the embedding pipeline for every document in the `embedding` state.
    async fn sweep_pending(&self, batch_size: Option<usize>)
    -> Result<SweepOutcome, ProcessingError>;

    /// Force-fail documents stuck in flight beyond the staleness threshold.
    async fn sweep_stuck(&self) -> Result<Vec<String>, ProcessingError>;

    /// Fetch one document record, including extracted content.
    async fn get_document(&self, id: &str) -> Result<DocumentRecord, ProcessingError>;

    /// Enumerate document summaries, newest first.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, ProcessingError>;

    /// Delete a document record and its vectors.
    async fn delete_document(&self, id: &str) -> Result<DocumentSummary, ProcessingError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl IngestionService {
    /// Build a new ingestion service from configuration, sharing the given
    /// index handle with the rest of the process.
    pub fn new(index: Arc<dyn VectorIndex>, metrics: Arc<ServiceMetrics>) -> Self {
        tracing::info!("Initializing embedding client");
        let embedding_client = get_embedding_client();
        Self::with_components(
            Arc::new(InMemoryDocumentStore::new()),
            Box::new(PlainTextExtractor::new()),
            embedding_client,
            index,
            metrics,
        )
    }

    /// Assemble a service from explicit components.
    pub fn with_components(
        store: Arc<dyn DocumentStore>,
        extractor: Box<dyn ContentExtractor>,
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
        index: Arc<dyn VectorIndex>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            store,
            extractor,
            embedding_client,
            index,
            metrics,
        }
    }

    /// Validate, extract, and index a batch of files; failures are isolated
    /// per file and reported alongside successes.
    pub async fn upload(&self, files: Vec<UploadFile>) -> BatchUploadOutcome {
        let results =
            future::join_all(files.into_iter().map(|file| self.ingest_file(file))).await;

        let mut outcome = BatchUploadOutcome::default();
        for result in results {
            match result {
                Ok(summary) => outcome.documents.push(summary),
                Err(failure) => outcome.errors.push(failure),
            }
        }
        tracing::info!(
            accepted = outcome.documents.len(),
            rejected = outcome.errors.len(),
            "Upload batch handled"
        );
        outcome
    }

    /// Run the embedding pipeline for one document in the `embedding` state.
    ///
    /// Documents in any other state — including the terminal `completed` and
    /// `error` states — are left untouched.
    pub async fn process_document(
        &self,
        id: &str,
        batch_size: Option<usize>,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let record = self.store.get(id).await?;
        if record.status != ProcessingStatus::Embedding {
            return Err(ProcessingError::NotEligible {
                id: id.to_string(),
                status: record.status,
            });
        }
        self.run_pipeline(record, batch_size).await
    }

    /// Sweep every document currently awaiting embedding.
    pub async fn sweep_pending(
        &self,
        batch_size: Option<usize>,
    ) -> Result<SweepOutcome, ProcessingError> {
        let pending: Vec<DocumentRecord> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|record| record.status == ProcessingStatus::Embedding)
            .collect();

        tracing::info!(pending = pending.len(), "Sweeping documents awaiting embedding");

        let results: Vec<(String, Result<ProcessingOutcome, ProcessingError>)> =
            stream::iter(pending)
                .map(|record| {
                    let id = record.id.clone();
                    async move { (id, self.run_pipeline(record, batch_size).await) }
                })
                .buffer_unordered(SWEEP_CONCURRENCY)
                .collect()
                .await;

        let mut outcome = SweepOutcome::default();
        for (document_id, result) in results {
            match result {
                Ok(processed) => outcome.processed.push(processed),
                Err(error) => outcome.failed.push(SweepFailure {
                    document_id,
                    error: error.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    /// Force-fail documents stuck in flight beyond the staleness threshold.
    ///
    /// Idempotent: documents that already reached a terminal state are skipped
    /// via the store's transition guard.
    pub async fn sweep_stuck(&self) -> Result<Vec<String>, ProcessingError> {
        let config = get_config();
        let threshold = Duration::seconds(config.stuck_threshold_secs as i64);
        let now = OffsetDateTime::now_utc();
        let mut swept = Vec::new();

        for record in self.store.list().await? {
            if !record.status.is_in_flight() || now - record.upload_date <= threshold {
                continue;
            }
            let message = format!(
                "processing stalled in state '{}' for more than {}s",
                record.status, config.stuck_threshold_secs
            );
            match self
                .store
                .transition(
                    &record.id,
                    &[ProcessingStatus::Extracting, ProcessingStatus::Embedding],
                    DocumentPatch::error(message),
                )
                .await
            {
                Ok(_) => {
                    tracing::warn!(document = %record.id, "Force-failed stuck document");
                    self.metrics.record_failure();
                    swept.push(record.id);
                }
                Err(StoreError::StatusConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(swept)
    }

    /// Delete a document record together with its indexed vectors.
    pub async fn delete_document(&self, id: &str) -> Result<DocumentSummary, ProcessingError> {
        self.store.get(id).await?;
        // Vectors first: if the index delete fails the record stays visible
        // and the operation can be retried.
        self.index.delete_document(id).await?;
        let removed = self.store.delete(id).await?;
        tracing::info!(document = %id, "Document deleted");
        Ok(removed.summary())
    }

    async fn ingest_file(&self, file: UploadFile) -> Result<DocumentSummary, UploadFailure> {
        let filename = file.filename.clone();
        let config = get_config();

        let file_type = match validate_upload(&file, config.max_upload_bytes) {
            Ok(file_type) => file_type,
            Err(error) => {
                tracing::warn!(filename = %filename, error = %error, "Upload rejected");
                return Err(UploadFailure {
                    filename,
                    error: error.to_string(),
                });
            }
        };

        let record = DocumentRecord::new(
            filename.clone(),
            file_type.clone(),
            file.content.len() as u64,
            file.metadata,
        );
        let id = record.id.clone();
        if let Err(error) = self.store.insert(record).await {
            return Err(UploadFailure {
                filename,
                error: error.to_string(),
            });
        }

        let extracted = match self.extractor.extract(&file.content, &file_type).await {
            Ok(extracted) => extracted,
            Err(error) => {
                let error = ProcessingError::from(error);
                self.fail_document(&id, &error).await;
                return Err(UploadFailure {
                    filename,
                    error: error.to_string(),
                });
            }
        };

        let record = match self
            .store
            .transition(
                &id,
                &[ProcessingStatus::Extracting],
                DocumentPatch {
                    status: Some(ProcessingStatus::Embedding),
                    extracted_content: Some(extracted.text),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(record) => record,
            Err(error) => {
                return Err(UploadFailure {
                    filename,
                    error: error.to_string(),
                });
            }
        };

        match self.run_pipeline(record, None).await {
            Ok(_) => match self.store.get(&id).await {
                Ok(record) => Ok(record.summary()),
                Err(error) => Err(UploadFailure {
                    filename,
                    error: error.to_string(),
                }),
            },
            Err(error) => Err(UploadFailure {
                filename,
                error: error.to_string(),
            }),
        }
    }

    /// Run the embedding pipeline for a document already in the `embedding`
    /// state, then settle its terminal status.
    async fn run_pipeline(
        &self,
        record: DocumentRecord,
        batch_size: Option<usize>,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let id = record.id.clone();
        match self.embed_and_index(&record, batch_size).await {
            Ok(chunk_count) => {
                self.store
                    .transition(
                        &id,
                        &[ProcessingStatus::Embedding],
                        DocumentPatch::completed(chunk_count),
                    )
                    .await?;
                self.metrics.record_document(chunk_count as u64);
                tracing::info!(document = %id, chunks = chunk_count, "Document indexed");
                Ok(ProcessingOutcome {
                    document_id: id,
                    chunk_count,
                })
            }
            Err(error) => {
                tracing::warn!(document = %id, error = %error, "Document processing failed");
                self.fail_document(&id, &error).await;
                Err(error)
            }
        }
    }

    /// Chunk, embed, and upsert one document's content, batch by batch.
    ///
    /// Batches are durably indexed as they complete; a mid-pipeline failure
    /// leaves the already-written prefix in place. Point ids are deterministic,
    /// so a retry overwrites that prefix instead of duplicating it.
    async fn embed_and_index(
        &self,
        record: &DocumentRecord,
        batch_size: Option<usize>,
    ) -> Result<usize, ProcessingError> {
        let config = get_config();
        let content = record
            .extracted_content
            .as_deref()
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProcessingError::EmptyDocument {
                id: record.id.clone(),
            })?;

        let chunks = chunk_text(
            content,
            config.chunk_max_tokens,
            config.chunk_overlap_tokens,
        )?;
        if chunks.is_empty() {
            return Err(ProcessingError::NoChunks {
                id: record.id.clone(),
            });
        }

        let batch_size = batch_size.unwrap_or(config.embed_batch_size).max(1);
        let upload_date = record
            .upload_date
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
        let total = chunks.len();

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let vectors = self.embedding_client.generate_embeddings(texts).await?;

            debug_assert_eq!(batch.len(), vectors.len());

            let points: Vec<PointInsert> = batch
                .iter()
                .zip(vectors.into_iter())
                .map(|(chunk, vector)| PointInsert {
                    id: chunk_point_id(&record.id, chunk.index),
                    vector,
                    payload: ChunkPayload {
                        document_id: record.id.clone(),
                        filename: record.filename.clone(),
                        file_type: record.file_type.clone(),
                        upload_date: upload_date.clone(),
                        chunk_index: chunk.index,
                        text: chunk.content.clone(),
                    },
                })
                .collect();

            self.index.upsert(points).await?;
            tracing::debug!(
                document = %record.id,
                batch = batch_no,
                batch_size,
                total,
                "Batch upserted"
            );
        }

        Ok(total)
    }

    /// Move an in-flight document to the error state, leaving terminal
    /// documents untouched.
    async fn fail_document(&self, id: &str, error: &ProcessingError) {
        let result = self
            .store
            .transition(
                id,
                &[ProcessingStatus::Extracting, ProcessingStatus::Embedding],
                DocumentPatch::error(error.to_string()),
            )
            .await;
        match result {
            Ok(_) => self.metrics.record_failure(),
            Err(StoreError::StatusConflict { actual, .. }) => {
                tracing::debug!(document = %id, status = %actual, "Skipped error transition on settled document");
            }
            Err(store_error) => {
                tracing::error!(document = %id, error = %store_error, "Failed to record document error");
            }
        }
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Check an upload against the type allow-list and size cap, returning its
/// normalized file type.
fn validate_upload(file: &UploadFile, max_bytes: u64) -> Result<String, ValidationError> {
    if file.content.is_empty() {
        return Err(ValidationError::EmptyFile);
    }
    let size = file.content.len() as u64;
    if size > max_bytes {
        return Err(ValidationError::TooLarge {
            size,
            max: max_bytes,
        });
    }

    let file_type = file
        .filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_lowercase())
        .filter(|extension| !extension.is_empty())
        .ok_or(ValidationError::MissingExtension)?;

    if !ALLOWED_FILE_TYPES.contains(&file_type.as_str()) {
        return Err(ValidationError::UnsupportedType { file_type });
    }
    Ok(file_type)
}

#[async_trait]
impl DocumentsApi for IngestionService {
    async fn upload(&self, files: Vec<UploadFile>) -> BatchUploadOutcome {
        IngestionService::upload(self, files).await
    }

    async fn process_document(
        &self,
        id: &str,
        batch_size: Option<usize>,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        IngestionService::process_document(self, id, batch_size).await
    }

    async fn sweep_pending(
        &self,
        batch_size: Option<usize>,
    ) -> Result<SweepOutcome, ProcessingError> {
        IngestionService::sweep_pending(self, batch_size).await
    }

    async fn sweep_stuck(&self) -> Result<Vec<String>, ProcessingError> {
        IngestionService::sweep_stuck(self).await
    }

    async fn get_document(&self, id: &str) -> Result<DocumentRecord, ProcessingError> {
        Ok(self.store.get(id).await?)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, ProcessingError> {
        let records = self.store.list().await?;
        Ok(records.iter().map(DocumentRecord::summary).collect())
    }

    async fn delete_document(&self, id: &str) -> Result<DocumentSummary, ProcessingError> {
        IngestionService::delete_document(self, id).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestionService::metrics_snapshot(self)
    }
}
