//! Functional tests for the router: discovery, relay and traffic logging

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use sentiment_gateway::{
    api,
    backend::{Deployment, DeploymentStatus, HostingService, InvocationResponse},
    config::Settings,
    AppError, Result, RouterAppState,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// In-memory hosting service with a fixed listing and a canned reply
struct MockHosting {
    listing: Option<Vec<Deployment>>,
    reply: InvocationResponse,
    invocations: AtomicUsize,
    invoked: Mutex<Vec<String>>,
    content_types: Mutex<Vec<Option<String>>>,
}

impl MockHosting {
    fn new(listing: Option<Vec<Deployment>>, reply: InvocationResponse) -> Arc<Self> {
        Arc::new(Self {
            listing,
            reply,
            invocations: AtomicUsize::new(0),
            invoked: Mutex::new(Vec::new()),
            content_types: Mutex::new(Vec::new()),
        })
    }

    fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostingService for MockHosting {
    async fn list_deployments(&self, _name_contains: &str) -> Result<Vec<Deployment>> {
        self.listing
            .clone()
            .ok_or_else(|| AppError::BackendUnavailable("listing failed".to_string()))
    }

    async fn invoke(
        &self,
        deployment: &str,
        _payload: Bytes,
        content_type: Option<&str>,
    ) -> Result<InvocationResponse> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.invoked.lock().unwrap().push(deployment.to_string());
        self.content_types
            .lock()
            .unwrap()
            .push(content_type.map(str::to_string));
        Ok(self.reply.clone())
    }
}

fn deployment(name: &str, status: DeploymentStatus, created: i64) -> Deployment {
    Deployment::new(name, status, Utc.timestamp_opt(created, 0).unwrap())
}

fn reference_listing() -> Vec<Deployment> {
    vec![
        deployment("sentiment-analysis-v2-100", DeploymentStatus::InService, 100),
        deployment("sentiment-analysis-v2-200", DeploymentStatus::Failed, 200),
    ]
}

fn json_reply(status: u16, body: Value) -> InvocationResponse {
    InvocationResponse {
        status,
        content_type: Some("application/json".to_string()),
        body: Bytes::from(body.to_string()),
    }
}

fn state_with(hosting: Arc<MockHosting>, log_path: PathBuf) -> Arc<RouterAppState> {
    let mut settings = Settings::default();
    settings.router.traffic_log_path = log_path;
    Arc::new(RouterAppState::with_hosting(settings, hosting))
}

fn predict_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn log_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_routes_to_newest_in_service_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let hosting = MockHosting::new(
        Some(reference_listing()),
        json_reply(200, json!({"predictions": ["joy"]})),
    );
    let state = state_with(hosting.clone(), dir.path().join("log.csv"));

    let outcome = state
        .gateway
        .forward(Bytes::from_static(br#"{"text": ["great"]}"#), Some("application/json"))
        .await
        .unwrap();

    assert_eq!(outcome.backend, "sentiment-analysis-v2-100");
    assert_eq!(*hosting.invoked.lock().unwrap(), vec!["sentiment-analysis-v2-100"]);
}

#[tokio::test]
async fn test_successful_forward_logs_one_record_per_text() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("prediction_logs.csv");
    let hosting = MockHosting::new(
        Some(reference_listing()),
        json_reply(200, json!({"predictions": ["joy", "anger", "fear"]})),
    );
    let state = state_with(hosting, log_path.clone());

    let outcome = state
        .gateway
        .forward(Bytes::from_static(br#"{"text": ["yay", "grr", "eek"]}"#), Some("application/json"))
        .await
        .unwrap();
    outcome.log_task.expect("success schedules logging").await.unwrap();

    assert_eq!(
        log_lines(&log_path),
        vec!["text,label", "yay,joy", "grr,anger", "eek,fear"]
    );
}

#[tokio::test]
async fn test_response_is_relayed_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let reply = r#"{"predictions":["sadness"],"extra":{"kept":true}}"#;
    let hosting = MockHosting::new(
        Some(reference_listing()),
        InvocationResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: Bytes::from_static(reply.as_bytes()),
        },
    );
    let app = api::proxy::create_router(state_with(hosting, dir.path().join("log.csv")));

    let (status, body) = send(app, predict_request(r#"{"text": "meh"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, reply.as_bytes());
}

#[tokio::test]
async fn test_backend_error_is_propagated_without_logging() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("log.csv");
    let hosting = MockHosting::new(
        Some(reference_listing()),
        json_reply(500, json!({"error": "Inference Logic Error: boom"})),
    );
    let state = state_with(hosting, log_path.clone());

    let outcome = state
        .gateway
        .forward(Bytes::from_static(br#"{"text": "x"}"#), Some("application/json"))
        .await
        .unwrap();
    assert_eq!(outcome.response.status, 500);
    assert!(outcome.log_task.is_none());

    let app = api::proxy::create_router(state);
    let (status, body) = send(app, predict_request(r#"{"text": "x"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({"error": "Inference Logic Error: boom"})
    );
    assert!(log_lines(&log_path).is_empty());
}

#[tokio::test]
async fn test_no_in_service_deployment_is_503_without_backend_call() {
    let listings = vec![
        Some(vec![]),
        Some(vec![
            deployment("sentiment-analysis-v2-1", DeploymentStatus::Creating, 1),
            deployment("sentiment-analysis-v2-2", DeploymentStatus::Deleting, 2),
        ]),
        None,
    ];

    for listing in listings {
        let dir = tempfile::tempdir().unwrap();
        let hosting = MockHosting::new(listing, json_reply(200, json!({"predictions": ["joy"]})));
        let app = api::proxy::create_router(state_with(hosting.clone(), dir.path().join("log.csv")));

        let (status, body) = send(app, predict_request(r#"{"text": "hello"}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"error": "no active backend"})
        );
        assert_eq!(hosting.invocation_count(), 0);
    }
}

#[tokio::test]
async fn test_log_failure_does_not_change_response() {
    let dir = tempfile::tempdir().unwrap();
    let hosting = MockHosting::new(
        Some(reference_listing()),
        json_reply(200, json!({"predictions": ["joy"]})),
    );
    // the log path is a directory, so every append fails
    let state = state_with(hosting, dir.path().to_path_buf());

    let outcome = state
        .gateway
        .forward(Bytes::from_static(br#"{"text": "yay"}"#), Some("application/json"))
        .await
        .unwrap();
    assert_eq!(outcome.response.status, 200);
    outcome.log_task.unwrap().await.unwrap();

    let app = api::proxy::create_router(state);
    let (status, body) = send(app, predict_request(r#"{"text": "yay"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({"predictions": ["joy"]})
    );
}

#[tokio::test]
async fn test_mismatched_prediction_count_is_not_logged() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("log.csv");
    let hosting = MockHosting::new(
        Some(reference_listing()),
        json_reply(200, json!({"predictions": ["joy"]})),
    );
    let state = state_with(hosting, log_path.clone());

    let outcome = state
        .gateway
        .forward(Bytes::from_static(br#"{"text": ["a", "b"]}"#), Some("application/json"))
        .await
        .unwrap();
    assert_eq!(outcome.response.status, 200);
    outcome.log_task.unwrap().await.unwrap();

    assert!(log_lines(&log_path).is_empty());
}

#[tokio::test]
async fn test_status_page_names_backend() {
    let dir = tempfile::tempdir().unwrap();
    let hosting = MockHosting::new(Some(reference_listing()), json_reply(200, json!({})));
    let app = api::proxy::create_router(state_with(hosting, dir.path().join("log.csv")));

    let (status, body) = send(app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("sentiment-analysis-v2-100"));
}

#[tokio::test]
async fn test_status_page_without_backend() {
    let dir = tempfile::tempdir().unwrap();
    let hosting = MockHosting::new(Some(vec![]), json_reply(200, json!({})));
    let app = api::proxy::create_router(state_with(hosting, dir.path().join("log.csv")));

    let (status, body) = send(app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("no InService deployments"));
}

#[tokio::test]
async fn test_end_to_end_over_http_hosting_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/deployments"))
        .and(query_param("nameContains", "sentiment-analysis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deployments": [
                {"name": "sentiment-analysis-v2-200", "status": "Failed", "createdAt": "2024-06-02T00:00:00Z"},
                {"name": "sentiment-analysis-v2-100", "status": "InService", "createdAt": "2024-06-01T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/deployments/sentiment-analysis-v2-100/invocations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": ["joy", "fear"]})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("prediction_logs.csv");
    let mut settings = Settings::default();
    settings.discovery.hosting_url = server.uri();
    settings.router.traffic_log_path = log_path.clone();
    let app = api::proxy::create_router(Arc::new(RouterAppState::from_settings(settings).unwrap()));

    let (status, body) = send(app, predict_request(r#"{"text": ["nice", "scary"]}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({"predictions": ["joy", "fear"]})
    );

    // the traffic log is written after the response, poll briefly
    let mut lines = Vec::new();
    for _ in 0..50 {
        lines = log_lines(&log_path);
        if lines.len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(lines, vec!["text,label", "nice,joy", "scary,fear"]);
}

#[tokio::test]
async fn test_caller_content_type_is_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let hosting = MockHosting::new(
        Some(reference_listing()),
        json_reply(200, json!({"predictions": ["joy"]})),
    );
    let state = state_with(hosting.clone(), dir.path().join("log.csv"));

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("happy"))
        .unwrap();
    send(api::proxy::create_router(state.clone()), request).await;

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::from(r#"{"text": "happy"}"#))
        .unwrap();
    send(api::proxy::create_router(state), request).await;

    assert_eq!(
        *hosting.content_types.lock().unwrap(),
        vec![Some("text/plain".to_string()), None]
    );
}

#[tokio::test]
async fn test_backend_unsupported_media_type_reaches_caller() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/deployments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deployments": [
                {"name": "sentiment-analysis-v2-100", "status": "InService", "createdAt": 1717200000}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/deployments/sentiment-analysis-v2-100/invocations"))
        .and(header("content-type", "text/plain"))
        .respond_with(
            ResponseTemplate::new(415)
                .set_body_raw("This predictor only supports application/json data", "text/plain"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("prediction_logs.csv");
    let mut settings = Settings::default();
    settings.discovery.hosting_url = server.uri();
    settings.router.traffic_log_path = log_path.clone();
    let app = api::proxy::create_router(Arc::new(RouterAppState::from_settings(settings).unwrap()));

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("happy"))
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body, b"This predictor only supports application/json data");
    assert!(log_lines(&log_path).is_empty());
}
