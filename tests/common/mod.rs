//! Shared fixtures for integration tests: test configuration, an in-process
//! vector index, and fully wired services backed by deterministic components.

use askdocs::{
    chat::{AnswerComposer, QueryService},
    config::{CompletionProvider, Config, EmbeddingProvider, CONFIG},
    documents::{DocumentStore, InMemoryDocumentStore, PlainTextExtractor},
    embedding::DeterministicEmbeddingClient,
    metrics::ServiceMetrics,
    processing::IngestionService,
    qdrant::{PointInsert, QdrantError, ScoredPoint, SearchFilterArgs, VectorIndex},
    retrieval::RetrievalEngine,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Once};
use tokio::sync::RwLock;

pub const TEST_DIMENSION: usize = 64;

/// Install a fixed configuration for the test process.
pub fn ensure_test_config() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = CONFIG.set(Config {
            qdrant_url: "http://127.0.0.1:6333".into(),
            qdrant_collection_name: "askdocs-test".into(),
            qdrant_api_key: None,
            embedding_provider: EmbeddingProvider::Deterministic,
            completion_provider: CompletionProvider::None,
            openai_base_url: "https://api.openai.com/v1".into(),
            openai_api_key: None,
            embedding_model: "test-model".into(),
            embedding_dimension: TEST_DIMENSION,
            chat_model: "test-chat-model".into(),
            chunk_max_tokens: 1000,
            chunk_overlap_tokens: 100,
            embed_batch_size: 64,
            stuck_threshold_secs: 120,
            max_upload_bytes: 10 * 1024 * 1024,
            server_port: None,
        });
    });
}

/// In-process vector index with cosine ranking and allow-list filters.
#[derive(Default)]
pub struct MemoryVectorIndex {
    points: RwLock<HashMap<String, PointInsert>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids currently held by the index, sorted for stable comparison.
    pub async fn point_ids(&self) -> Vec<String> {
        let points = self.points.read().await;
        let mut ids: Vec<String> = points.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn passes_filter(point: &PointInsert, filter: &SearchFilterArgs) -> bool {
    if let Some(ids) = &filter.document_ids
        && !ids.contains(&point.payload.document_id)
    {
        return false;
    }
    if let Some(types) = &filter.file_types
        && !types.contains(&point.payload.file_type)
    {
        return false;
    }
    true
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_ready(&self, _vector_size: u64) -> Result<(), QdrantError> {
        Ok(())
    }

    async fn upsert(&self, new_points: Vec<PointInsert>) -> Result<(), QdrantError> {
        let mut points = self.points.write().await;
        for point in new_points {
            points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &SearchFilterArgs,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let points = self.points.read().await;
        let mut scored: Vec<ScoredPoint> = points
            .values()
            .filter(|point| passes_filter(point, filter))
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: cosine(&vector, &point.vector),
                payload: Some(point.payload.clone()),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), QdrantError> {
        let mut points = self.points.write().await;
        points.retain(|_, point| point.payload.document_id != document_id);
        Ok(())
    }
}

/// Everything an end-to-end test needs, wired against shared components.
pub struct TestHarness {
    pub store: Arc<InMemoryDocumentStore>,
    pub index: Arc<MemoryVectorIndex>,
    pub metrics: Arc<ServiceMetrics>,
    pub ingestion: IngestionService,
    pub query: QueryService,
}

pub fn harness() -> TestHarness {
    ensure_test_config();
    let store = Arc::new(InMemoryDocumentStore::new());
    let index = Arc::new(MemoryVectorIndex::new());
    let metrics = Arc::new(ServiceMetrics::new());

    let ingestion = IngestionService::with_components(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Box::new(PlainTextExtractor::new()),
        Box::new(DeterministicEmbeddingClient::new(TEST_DIMENSION)),
        Arc::clone(&index) as Arc<dyn VectorIndex>,
        Arc::clone(&metrics),
    );

    let retrieval = RetrievalEngine::with_components(
        Box::new(DeterministicEmbeddingClient::new(TEST_DIMENSION)),
        Arc::clone(&index) as Arc<dyn VectorIndex>,
        TEST_DIMENSION,
    );
    let query = QueryService::with_components(
        retrieval,
        AnswerComposer::with_client(None),
        Arc::clone(&metrics),
    );

    TestHarness {
        store,
        index,
        metrics,
        ingestion,
        query,
    }
}
