//! Guideline editing API over a real listener.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use creview::guidelines::JsonGuidelineStore;
use creview::server::serve;
use creview_core::models::GuidelineRecord;
use creview_core::store::memory::InMemoryGuidelineStore;
use creview_core::store::GuidelineStore;

async fn start(store: Arc<dyn GuidelineStore>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(listener, store).await.unwrap();
    });
    addr
}

fn seed() -> Vec<GuidelineRecord> {
    vec![GuidelineRecord {
        id: "G001".to_string(),
        rule: "Avoid goto".to_string(),
        severity: "medium".to_string(),
        category: "control".to_string(),
        description: "goto makes control flow hard to follow".to_string(),
        example: None,
        suggestion: None,
    }]
}

fn draft(rule: &str) -> Value {
    json!({
        "rule": rule,
        "severity": "high",
        "category": "memory",
        "description": "always check malloc for NULL"
    })
}

#[tokio::test]
async fn health_reports_version() {
    let addr = start(Arc::new(InMemoryGuidelineStore::new())).await;
    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn crud_round_trip() {
    let addr = start(Arc::new(InMemoryGuidelineStore::with_records(seed()))).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}/guidelines");

    let resp = client.post(&base).json(&draft("Check malloc")).send().await.unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["id"], "G002");

    let list: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert_eq!(list["guidelines"].as_array().unwrap().len(), 2);

    let resp = client
        .put(format!("{base}/G002"))
        .json(&draft("Check every allocation"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["id"], "G002");
    assert_eq!(updated["rule"], "Check every allocation");

    let fetched: Value = client
        .get(format!("{base}/G002"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["rule"], "Check every allocation");

    let resp = client.delete(format!("{base}/G002")).send().await.unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client.get(format!("{base}/G002")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let addr = start(Arc::new(InMemoryGuidelineStore::with_records(seed()))).await;
    let client = reqwest::Client::new();

    let resp = client
        .delete(format!("http://{addr}/guidelines/G042"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["message"], "no guideline with id G042");

    let resp = client
        .put(format!("http://{addr}/guidelines/G042"))
        .json(&draft("x"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn invalid_drafts_are_rejected() {
    let addr = start(Arc::new(InMemoryGuidelineStore::new())).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}/guidelines");

    let resp = client.post(&base).json(&draft("   ")).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    // Missing description is a decode failure, not a 422.
    let resp = client
        .post(&base)
        .json(&json!({"rule": "r", "severity": "low"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let list: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert!(list["guidelines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn json_store_edits_reach_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("guidelines/guidelines.json");
    let addr = start(Arc::new(JsonGuidelineStore::new(path.clone()))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/guidelines"))
        .json(&draft("Check malloc"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let on_disk = JsonGuidelineStore::new(path).load_all().unwrap();
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0].id, "G001");
    assert_eq!(on_disk[0].rule, "Check malloc");
}

#[tokio::test]
async fn missing_guideline_file_is_an_internal_error() {
    let tmp = TempDir::new().unwrap();
    let store = JsonGuidelineStore::new(tmp.path().join("absent.json"));
    let addr = start(Arc::new(store)).await;

    let resp = reqwest::get(format!("http://{addr}/guidelines")).await.unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");
}
