//! Admission over HTTP: router-level tests with `oneshot`, plus one test
//! against a real listener.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use wg_exchange::config::ExchangeConfig;
use wg_exchange::http::{build_router, AdmissionServer, AppState, HealthResponse};
use wg_exchange::lifecycle::startup::{self, Services};
use wg_exchange::service::ServiceController;
use wg_exchange::wireguard::ClientConf;

mod common;
use common::{key, test_config, MemorySink, RecordingController};

fn services(config: &ExchangeConfig) -> Services {
    let controller: Arc<dyn ServiceController> = RecordingController::new();
    startup::build_with_sink(config, controller, Box::new(MemorySink::new())).unwrap()
}

fn router(services: &Services, config: &ExchangeConfig) -> Router {
    build_router(
        &config.listener,
        AppState {
            store: services.store.clone(),
        },
    )
}

fn add_peer(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/add-peer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn credentials(n: u16) -> String {
    serde_json::json!({
        "public_key": STANDARD.encode(key(n)),
        "preshared_key": STANDARD.encode([7u8; 32]),
    })
    .to_string()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_admission_returns_client_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let services = services(&config);
    let app = router(&services, &config);

    let response = app.oneshot(add_peer(credentials(1))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let conf: ClientConf = serde_json::from_str(&body_text(response).await).unwrap();
    let addrs: Vec<String> = conf.interface.address.iter().map(|a| a.to_string()).collect();
    assert_eq!(addrs, vec!["10.8.0.2/32", "fd00:8::2/128"]);
    assert_eq!(conf.peers.len(), 1);
    assert_eq!(conf.peers[0].endpoint.as_deref(), Some("203.0.113.7:51820"));
    assert!(conf.interface.private_key.is_none(), "private keys never travel");
}

#[tokio::test]
async fn test_rejections_map_to_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let services = services(&config);
    let app = router(&services, &config);

    let first = app.clone().oneshot(add_peer(credentials(1))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let duplicate = app.clone().oneshot(add_peer(credentials(1))).await.unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(body_text(duplicate).await, "rejected: public key already admitted");

    let short_key = serde_json::json!({ "public_key": STANDARD.encode([1u8; 16]) }).to_string();
    let bad = app.clone().oneshot(add_peer(short_key)).await.unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(bad).await, "invalid public key");

    let not_base64 = r#"{"public_key": "%%%"}"#.to_string();
    let garbled = app.clone().oneshot(add_peer(not_base64)).await.unwrap();
    assert_eq!(garbled.status(), StatusCode::BAD_REQUEST);

    let no_type = Request::builder()
        .method("POST")
        .uri("/add-peer")
        .body(Body::from(credentials(2)))
        .unwrap();
    let unsupported = app.clone().oneshot(no_type).await.unwrap();
    assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    assert_eq!(services.store.admitted_count(), 1);
}

#[tokio::test]
async fn test_full_queue_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.processor.queue_capacity = 1;
    // The processor is never started, so the queue does not drain.
    let services = services(&config);
    let app = router(&services, &config);

    let first = app.clone().oneshot(add_peer(credentials(1))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(add_peer(credentials(2))).await.unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_text(second).await, "buffer full, retry later");
    assert_eq!(services.store.admitted_count(), 1);
}

#[tokio::test]
async fn test_health_reports_admitted_peers() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let services = services(&config);
    services.store.admit_peer(&key(1), None).unwrap();
    let app = router(&services, &config);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.admitted_peers, 1);
    assert_eq!(health.server_public_key, services.store.server_public_key().to_base64());
}

#[tokio::test]
async fn test_server_serves_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let services = services(&config);

    let server = AdmissionServer::new(config.listener.clone(), services.store.clone());
    let handle = server.handle();
    let token = CancellationToken::new();
    let task = tokio::spawn(server.run(token.clone()));

    let addr = handle.listening().await.expect("server bound");
    let response = reqwest::Client::new()
        .post(format!("http://{}/add-peer", addr))
        .header("content-type", "application/json")
        .body(credentials(42))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let conf: ClientConf = response.json().await.unwrap();
    assert_eq!(conf.interface.address[0].to_string(), "10.8.0.2/32");

    token.cancel();
    task.await.unwrap().unwrap();
    assert_eq!(services.store.admitted_count(), 1);
}

#[tokio::test]
async fn test_bind_failure_cancels_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    config.listener.bind_address = taken.local_addr().unwrap().to_string();
    let services = services(&config);

    let token = CancellationToken::new();
    let result = AdmissionServer::new(config.listener.clone(), services.store.clone())
        .run(token.clone())
        .await;

    assert!(result.is_err());
    assert!(token.is_cancelled());
}
