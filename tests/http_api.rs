use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use dispo::domains::DomainCache;
use dispo::error::FetchError;
use dispo::fetch::SourceFetcher;
use dispo::server::router;
use dispo::stats::Stats;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct FixedFetcher(&'static str);

#[async_trait]
impl SourceFetcher for FixedFetcher {
    async fn fetch(&self, _source: &str) -> Result<String, FetchError> {
        Ok(self.0.to_string())
    }
}

async fn build_app(dir: &tempfile::TempDir) -> (Router, Arc<Stats>) {
    let cache = Arc::new(DomainCache::new(
        vec!["https://lists.example/disposable.txt".to_string()],
        dir.path().join("domains.json"),
        Arc::new(FixedFetcher("trash-mail.net\nMailinator.com\n")),
    ));
    cache.refresh_cycle().await.unwrap();

    let stats = Arc::new(Stats::new());
    (router(cache, stats.clone()), stats)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn info_reports_domain_count() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = build_app(&dir).await;

    let (status, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domains"], 2);
    assert!(body["info"].as_str().unwrap().contains("/check?validate="));
    assert_eq!(body["stats"]["checks"], 0);
}

#[tokio::test]
async fn known_domain_is_suspicious() {
    let dir = tempfile::tempdir().unwrap();
    let (app, stats) = build_app(&dir).await;

    let (status, body) = get(app, "/check?validate=Trash-Mail.NET").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provided"], "domain");
    assert_eq!(body["domain"], "trash-mail.net");
    assert_eq!(body["status"], "suspicious");
    assert!(body["processing_ms"].is_number());
    assert_eq!(stats.snapshot().suspicious, 1);
}

#[tokio::test]
async fn email_is_checked_by_domain_part() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = build_app(&dir).await;

    let (status, body) = get(app, "/check?validate=max%40mailinator.com").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provided"], "email");
    assert_eq!(body["domain"], "mailinator.com");
    assert_eq!(body["status"], "suspicious");
}

#[tokio::test]
async fn unknown_domain_is_unsuspicious() {
    let dir = tempfile::tempdir().unwrap();
    let (app, stats) = build_app(&dir).await;

    let (status, body) = get(app, "/check?validate=hello@world.com").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domain"], "world.com");
    assert_eq!(body["status"], "unsuspicious");
    assert_eq!(stats.snapshot().unsuspicious, 1);
}

#[tokio::test]
async fn invalid_domain_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, stats) = build_app(&dir).await;

    let (status, body) = get(app, "/check?validate=not_a_domain").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid"));
    assert!(body.get("status").is_none());
    assert_eq!(stats.snapshot().invalid, 1);
}

#[tokio::test]
async fn missing_parameter_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    for uri in ["/check", "/check?validate=", "/check?other=x.com"] {
        let (app, _) = build_app(&dir).await;
        let (status, body) = get(app, uri).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].as_str().unwrap().contains("validate"), "{uri}");
    }
}

#[tokio::test]
async fn undecodable_query_gets_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let (app, stats) = build_app(&dir).await;

    let req = Request::builder()
        .uri("/check?validate=a.com&validate=b.com")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].as_str().unwrap().contains("validate"));
    assert_eq!(stats.snapshot().invalid, 1);
}
