// HTTP access path tests (router driven in-process with tower::ServiceExt)

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use netactivity::models::ActivityReport;
use netactivity::publisher::{DEFAULT_RECORD_MODE, Publisher};
use netactivity::routes;
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

fn record_in(dir: &TempDir) -> PathBuf {
    dir.path().join("net_activity")
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_version_endpoint() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(routes::app(record_in(&dir), 300), "/version").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("netactivity")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_activity_raw_serves_record() {
    let dir = TempDir::new().unwrap();
    let path = record_in(&dir);
    Publisher::new(&path, DEFAULT_RECORD_MODE)
        .publish_blocking(420)
        .unwrap();
    let (status, body) = get(routes::app(path, 300), "/activity").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "420\n");
}

#[tokio::test]
async fn test_activity_raw_unavailable_before_first_publish() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(routes::app(record_in(&dir), 300), "/activity").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_api_activity_applies_threshold() {
    let dir = TempDir::new().unwrap();
    let path = record_in(&dir);
    let publisher = Publisher::new(&path, DEFAULT_RECORD_MODE);

    publisher.publish_blocking(420).unwrap();
    let (status, body) = get(routes::app(path.clone(), 300), "/api/activity").await;
    assert_eq!(status, StatusCode::OK);
    let report: ActivityReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.value, Some(420));
    assert_eq!(report.threshold, 300);
    assert!(report.active);

    publisher.publish_blocking(15).unwrap();
    let (_, body) = get(routes::app(path, 300), "/api/activity").await;
    let report: ActivityReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.value, Some(15));
    assert!(!report.active);
}

#[tokio::test]
async fn test_api_activity_malformed_record_is_inactive() {
    let dir = TempDir::new().unwrap();
    let path = record_in(&dir);
    std::fs::write(&path, "garbage").unwrap();
    let (status, body) = get(routes::app(path, 300), "/api/activity").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(json["value"].is_null());
    assert_eq!(json["active"], serde_json::Value::Bool(false));
}
