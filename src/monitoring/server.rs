//! Exposition Server
//!
//! Serves `/metrics` (Prometheus text format) and `/health` (JSON) on one
//! listener. Handlers only read the registry and health state.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::metrics::MetricRegistry;
use crate::monitoring::HealthState;

const JSON_CONTENT_TYPE: &str = "application/json";
const PLAIN_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// State shared by every connection
#[derive(Debug, Clone)]
pub struct AppState {
    pub metrics: Arc<MetricRegistry>,
    pub health: Arc<HealthState>,
}

impl AppState {
    pub fn new(metrics: Arc<MetricRegistry>, health: Arc<HealthState>) -> Self {
        Self { metrics, health }
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Route a request path to its response.
pub fn route(path: &str, state: &AppState) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => match state.metrics.encode() {
            Ok(buffer) => respond(StatusCode::OK, prometheus::TEXT_FORMAT, buffer),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    PLAIN_CONTENT_TYPE,
                    "failed to encode metrics",
                )
            }
        },
        "/health" => match serde_json::to_vec(&state.health.response()) {
            Ok(body) => respond(StatusCode::OK, JSON_CONTENT_TYPE, body),
            Err(e) => {
                error!("Failed to encode health response: {}", e);
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    PLAIN_CONTENT_TYPE,
                    "failed to encode health",
                )
            }
        },
        _ => respond(StatusCode::NOT_FOUND, PLAIN_CONTENT_TYPE, "not found"),
    }
}

/// Bind `addr` and serve until `shutdown` is cancelled.
pub async fn run_server(addr: SocketAddr, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Server(format!("Failed to bind {}: {}", addr, e)))?;

    serve(listener, state, shutdown).await
}

/// Serve connections from an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Quota Exporter is running on http://{}/metrics", addr);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted
                .map_err(|e| Error::Server(format!("Accept error: {}", e)))?,
            _ = shutdown.cancelled() => {
                info!("Exposition server shutting down");
                return Ok(());
            }
        };

        debug!(%peer, "Accepted connection");
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let response = route(req.uri().path(), &state);
                async move { Ok::<_, Infallible>(response) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Server connection error: {}", e);
            }
        });
    }
}
