//! Document store abstraction and the in-memory reference backend.
//!
//! Every status change flows through [`DocumentStore::transition`], a
//! compare-and-swap primitive: the caller names the states it expects the
//! record to be in, and the store applies the patch atomically or reports a
//! conflict. Concurrent triggers against the same document (an explicit
//! per-document call racing a sweep) therefore cannot overwrite each other's
//! status writes.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::documents::types::{DocumentPatch, DocumentRecord, ProcessingStatus, StoreError};

/// Persistence interface for document lifecycle records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a freshly created record.
    async fn insert(&self, record: DocumentRecord) -> Result<(), StoreError>;

    /// Fetch one record by id.
    async fn get(&self, id: &str) -> Result<DocumentRecord, StoreError>;

    /// Enumerate all records.
    async fn list(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    /// Merge a patch into a record unconditionally.
    async fn update(&self, id: &str, patch: DocumentPatch) -> Result<DocumentRecord, StoreError>;

    /// Merge a patch only if the record is currently in one of `expected` states.
    ///
    /// Returns [`StoreError::StatusConflict`] when the precondition fails,
    /// leaving the record untouched.
    async fn transition(
        &self,
        id: &str,
        expected: &[ProcessingStatus],
        patch: DocumentPatch,
    ) -> Result<DocumentRecord, StoreError>;

    /// Remove a record, returning its final state.
    async fn delete(&self, id: &str) -> Result<DocumentRecord, StoreError>;
}

/// In-memory store backed by a `RwLock`-guarded map.
///
/// Suitable for single-process deployments and tests; the write lock makes
/// `transition` an atomic read-modify-write.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, record: DocumentRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists {
                id: record.id.clone(),
            });
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<DocumentRecord, StoreError> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let records = self.records.read().await;
        let mut all: Vec<DocumentRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(all)
    }

    async fn update(&self, id: &str, patch: DocumentPatch) -> Result<DocumentRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn transition(
        &self,
        id: &str,
        expected: &[ProcessingStatus],
        patch: DocumentPatch,
    ) -> Result<DocumentRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        if !expected.contains(&record.status) {
            return Err(StoreError::StatusConflict {
                id: id.to_string(),
                actual: record.status,
            });
        }
        patch.apply(record);
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<DocumentRecord, StoreError> {
        let mut records = self.records.write().await;
        records
            .remove(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }
}
