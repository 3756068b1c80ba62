//! Deterministic point identity for chunk vectors.

use uuid::Uuid;

/// Compute the stable point id for a `(document, chunk)` pair.
///
/// The id is a UUID v5 over a fixed namespace, so re-embedding a document
/// always writes to the same ids: retries overwrite, never duplicate. This is
/// what makes partial-failure recovery safe without rollback.
pub fn chunk_point_id(document_id: &str, chunk_index: usize) -> String {
    let name = format!("{document_id}:{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}
