use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{
    error::AppError,
    utils::{
        config::AppConfig,
        embedding::{EmbeddingBackend, EmbeddingProvider},
    },
};
use retrieval_pipeline::answer_retrieval::ChatModel;
use serde_json::Value;
use tower::ServiceExt;

use crate::{api_routes, api_state::ApiState};

const TEST_EMBEDDING_DIM: u32 = 32;
const BOUNDARY: &str = "AUDITRAGBOUNDARY";
const SOX_DOC: &str = "SOX revenue recognition requires control X";
const SEC_DOC: &str = "SEC filing: 10-K risk factors highlight revenue volatility";

#[derive(Default)]
struct CountingChatModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for CountingChatModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("Key SOX controls include control X over revenue recognition.".into())
    }
}

struct TestApp {
    _tmp: tempfile::TempDir,
    router: Router,
    chat: Arc<CountingChatModel>,
}

fn test_config(data_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        data_dir: data_dir.display().to_string(),
        embedding_backend: EmbeddingBackend::Hashed,
        embedding_dimensions: TEST_EMBEDDING_DIM,
        update_max_text_bytes: 256,
        ..Default::default()
    }
}

async fn test_app() -> TestApp {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = test_config(tmp.path());
    let chat = Arc::new(CountingChatModel::default());
    let state = ApiState::build(
        &config,
        Arc::new(EmbeddingProvider::new_hashed(TEST_EMBEDDING_DIM as usize)),
        chat.clone(),
    )
    .await
    .expect("state");

    TestApp {
        _tmp: tmp,
        router: api_routes(&state).with_state(state),
        chat,
    }
}

fn multipart_body(files: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, contents) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{contents}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn ingest_request(files: &[(&str, &str)]) -> Request<Body> {
    multipart_request(multipart_body(files))
}

fn multipart_request(body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/ingest")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn query_request(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn update_request(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/update_sec")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_live_probe() {
    let app = test_app().await;
    let (status, body) = send(&app.router, get_request("/live")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_reports_missing_stores_then_counts() {
    let app = test_app().await;

    let (status, body) = send(&app.router, get_request("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["checks"]["primary"]["status"], "fail");

    let (status, _) = send(&app.router, ingest_request(&[("sox.txt", SOX_DOC)])).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, get_request("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["primary"]["chunks"], 1);
    assert_eq!(body["checks"]["secondary"]["chunks"], 1);
}

#[tokio::test]
async fn test_ingest_reports_chunk_count() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        ingest_request(&[("sox.txt", SOX_DOC), ("sec.txt", SEC_DOC)]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chunks"], 2);
}

#[tokio::test]
async fn test_ingest_without_files_is_bad_request() {
    let app = test_app().await;

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nno files\r\n--{BOUNDARY}--\r\n"
    );
    let (status, body) = send(&app.router, multipart_request(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_query_before_ingest_is_service_unavailable() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        query_request(r#"{"query": "What are key SOX controls?"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(app.chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_query_flow_caches_and_records_memory() {
    let app = test_app().await;
    send(&app.router, ingest_request(&[("sox.txt", SOX_DOC)])).await;

    let (status, first) = send(
        &app.router,
        query_request(r#"{"query": "What are key SOX controls?"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["source"], "chain");
    assert_eq!(first["sources"][0]["source"], "sox.txt");

    let (status, second) = send(
        &app.router,
        query_request(r#"{"query": "  What are key SOX controls?  "}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["source"], "cache");
    assert_eq!(second["answer"], first["answer"]);
    assert!(second.get("sources").is_none());
    assert_eq!(app.chat.calls.load(Ordering::SeqCst), 1);

    let (status, memory) = send(&app.router, get_request("/memory")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        memory["controls"]["item_1"]["snippet"],
        "What are key SOX controls?"
    );
    assert!(memory["metadata"]["last_update"].is_string());
}

#[tokio::test]
async fn test_malformed_queries_are_bad_requests() {
    let app = test_app().await;

    let (status, _) = send(&app.router, query_request("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, query_request(r#"{"question": "x"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app.router, query_request(r#"{"query": "   "}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_update_sec_adds_only_to_secondary_store() {
    let app = test_app().await;
    send(&app.router, ingest_request(&[("sox.txt", SOX_DOC)])).await;

    let (status, body) = send(
        &app.router,
        update_request("text=SEC+adopts+new+climate+disclosure+rule"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["added_chunks"], 1);

    let (_, ready) = send(&app.router, get_request("/ready")).await;
    assert_eq!(ready["checks"]["primary"]["chunks"], 1);
    assert_eq!(ready["checks"]["secondary"]["chunks"], 2);
}

#[tokio::test]
async fn test_update_sec_validation() {
    let app = test_app().await;

    let (status, _) = send(&app.router, update_request("body=missing")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, update_request("text=+++")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = format!("text={}", "a".repeat(300));
    let (status, body) = send(&app.router, update_request(&oversized)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], "error");
}
