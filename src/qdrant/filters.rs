//! Filter helpers for Qdrant search and delete requests.

use serde_json::{Value, json};

use super::types::SearchFilterArgs;

/// Compose the Qdrant filter payload from optional allow-list arguments.
///
/// Both lists use `match.any`: a point passes when its field value is a member
/// of the supplied set. Empty or whitespace-only entries are dropped; a filter
/// with no surviving constraints is `None`.
pub fn build_search_filter(args: &SearchFilterArgs) -> Option<Value> {
    let mut must: Vec<Value> = Vec::new();

    if let Some(ids) = args.document_ids.as_ref() {
        let cleaned = clean_values(ids);
        if !cleaned.is_empty() {
            must.push(json!({
                "key": "document_id",
                "match": { "any": cleaned }
            }));
        }
    }

    if let Some(types) = args.file_types.as_ref() {
        let cleaned = clean_values(types);
        if !cleaned.is_empty() {
            must.push(json!({
                "key": "file_type",
                "match": { "any": cleaned }
            }));
        }
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

/// Filter selecting every point belonging to one document.
pub fn document_filter(document_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": "document_id",
                "match": { "value": document_id }
            }
        ]
    })
}

fn clean_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
