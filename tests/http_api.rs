//! HTTP-level tests over the real router and services, exercising the same
//! wiring the binary uses but with deterministic in-process backends.

mod common;

use askdocs::api::{AppState, create_router};
use askdocs::chat::REFUSAL_TEXT;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use common::harness;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let harness = harness();
    create_router(AppState {
        documents: Arc::new(harness.ingestion),
        query: Arc::new(harness.query),
    })
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(payload) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request"),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    };

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn upload_then_chat_round_trip() {
    let router = app();

    let (status, body) = send(
        &router,
        Method::POST,
        "/documents",
        Some(json!({
            "files": [
                { "filename": "policy.txt", "content": "Returns are accepted within 30 days of delivery." }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"].as_array().expect("documents").len(), 1);
    assert_eq!(body["documents"][0]["status"], "completed");
    let document_id = body["documents"][0]["id"]
        .as_str()
        .expect("document id")
        .to_string();

    let (status, body) = send(
        &router,
        Method::POST,
        "/chat",
        Some(json!({
            "question": "When are returns accepted?",
            "document_ids": [document_id]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["answer"], REFUSAL_TEXT);
    let sources = body["sources"].as_array().expect("sources");
    assert!(!sources.is_empty());
    assert_eq!(sources[0]["citation_index"], 1);
    assert_eq!(sources[0]["filename"], "policy.txt");
}

#[tokio::test]
async fn batch_upload_reports_invalid_file_without_aborting() {
    let router = app();

    let (status, body) = send(
        &router,
        Method::POST,
        "/documents",
        Some(json!({
            "files": [
                { "filename": "one.txt", "content": "first" },
                { "filename": "two.exe", "content": "nope" },
                { "filename": "three.txt", "content": "third" }
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"].as_array().expect("documents").len(), 2);
    let errors = body["errors"].as_array().expect("errors");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["filename"], "two.exe");
    assert!(
        errors[0]["error"]
            .as_str()
            .expect("message")
            .contains("unsupported file type")
    );
}

#[tokio::test]
async fn chat_without_matches_returns_refusal() {
    let router = app();

    let (status, body) = send(
        &router,
        Method::POST,
        "/chat",
        Some(json!({ "question": "What is in the vault?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], REFUSAL_TEXT);
    assert_eq!(body["sources"].as_array().expect("sources").len(), 0);
}

#[tokio::test]
async fn list_view_omits_extracted_content() {
    let router = app();

    send(
        &router,
        Method::POST,
        "/documents",
        Some(json!({
            "files": [
                { "filename": "visible.txt", "content": "A short body of text." }
            ]
        })),
    )
    .await;

    let (status, body) = send(&router, Method::GET, "/documents", None).await;
    assert_eq!(status, StatusCode::OK);
    let documents = body["documents"].as_array().expect("documents");
    assert_eq!(documents.len(), 1);
    assert!(documents[0].get("extracted_content").is_none());

    let id = documents[0]["id"].as_str().expect("id");
    let (status, record) = send(&router, Method::GET, &format!("/documents/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["extracted_content"], "A short body of text.");
}

#[tokio::test]
async fn delete_then_search_finds_nothing() {
    let router = app();

    let (_, body) = send(
        &router,
        Method::POST,
        "/documents",
        Some(json!({
            "files": [
                { "filename": "gone.txt", "content": "Ephemeral content scheduled for removal." }
            ]
        })),
    )
    .await;
    let id = body["documents"][0]["id"].as_str().expect("id").to_string();

    let (status, _) = send(&router, Method::DELETE, &format!("/documents/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        Method::POST,
        "/search",
        Some(json!({ "query": "ephemeral removal" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().expect("results").len(), 0);

    let (status, _) = send(&router, Method::GET, &format!("/documents/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn process_endpoint_rejects_unknown_document() {
    let router = app();

    let (status, body) = send(
        &router,
        Method::POST,
        "/documents/nonexistent/process",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(
        body["error"]
            .as_str()
            .expect("message")
            .contains("nonexistent")
    );
}

#[tokio::test]
async fn maintenance_sweep_reports_swept_ids() {
    let router = app();

    let (status, body) = send(&router, Method::POST, "/maintenance/stuck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["failed_documents"].as_array().expect("ids").len(),
        0
    );
}
