//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the admission and health handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Serve over plain TCP or rustls, stopping gracefully on cancellation
//! - Cancel the whole process when the listener fails

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_server::Handle;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admission::AdmissionStore;
use crate::config::ListenerConfig;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::tls::load_tls_config;
use crate::observability::metrics;
use crate::wireguard::keys::base64_bytes;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address {0:?}")]
    Address(String),

    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),

    #[error("listener failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AdmissionStore>,
}

/// Body of `POST /add-peer`. Keys are base64 strings on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmitRequest {
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,

    #[serde(default, with = "base64_bytes::option", skip_serializing_if = "Option::is_none")]
    pub preshared_key: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub admitted_peers: usize,
    pub server_public_key: String,
}

/// HTTP front end of the admission store.
pub struct AdmissionServer {
    router: Router,
    config: ListenerConfig,
    handle: Handle,
}

impl AdmissionServer {
    pub fn new(config: ListenerConfig, store: Arc<AdmissionStore>) -> Self {
        let router = build_router(&config, AppState { store });
        Self {
            router,
            config,
            handle: Handle::new(),
        }
    }

    /// Handle for observing the bound address.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Serve until `token` is cancelled. Any listener error cancels `token`.
    pub async fn run(self, token: CancellationToken) -> Result<(), ServerError> {
        let result = self.serve(&token).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "HTTP server failed");
            token.cancel();
        }
        result
    }

    async fn serve(self, token: &CancellationToken) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .map_err(|_| ServerError::Address(self.config.bind_address.clone()))?;

        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        let watcher = {
            let handle = self.handle.clone();
            let token = token.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                tracing::info!("HTTP server draining");
                handle.graceful_shutdown(Some(grace));
            })
        };

        let app = self.router.into_make_service();
        let served = match &self.config.tls {
            Some(tls) => {
                let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path))
                    .await
                    .map_err(ServerError::Tls);
                match rustls {
                    Ok(rustls) => {
                        tracing::info!(address = %addr, "HTTPS server starting");
                        axum_server::bind_rustls(addr, rustls)
                            .handle(self.handle)
                            .serve(app)
                            .await
                            .map_err(ServerError::Serve)
                    }
                    Err(e) => Err(e),
                }
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum_server::bind(addr)
                    .handle(self.handle)
                    .serve(app)
                    .await
                    .map_err(ServerError::Serve)
            }
        };
        watcher.abort();

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &ListenerConfig, state: AppState) -> Router {
    Router::new()
        .route("/add-peer", post(add_peer))
        .route("/health", get(health))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}

async fn add_peer(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AdmitRequest>, JsonRejection>,
) -> Response {
    let request_id = request_id(&headers);

    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(request_id = %request_id, error = %rejection, "Malformed admission request");
            metrics::record_admission("bad_request");
            let status = match rejection {
                JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                _ => StatusCode::BAD_REQUEST,
            };
            return (status, "invalid request body").into_response();
        }
    };

    match state
        .store
        .admit_peer(&request.public_key, request.preshared_key.as_deref())
    {
        Ok(conf) => {
            metrics::record_admission("admitted");
            tracing::info!(
                request_id = %request_id,
                addresses = ?conf.interface.address,
                "Peer admitted"
            );
            Json(conf).into_response()
        }
        Err(e) => {
            metrics::record_admission(e.label());
            tracing::warn!(request_id = %request_id, error = %e, "Admission rejected");
            e.into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        admitted_peers: state.store.admitted_count(),
        server_public_key: state.store.server_public_key().to_base64(),
    })
}
