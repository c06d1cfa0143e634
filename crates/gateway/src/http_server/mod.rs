use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use http::header::{ACCEPT, CONTENT_TYPE, LOCATION, ORIGIN};
use http::{Method, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

use common::content::PublishedView;
use common::envelope::unix_now;

use crate::config::Config;
use crate::registry::{Registry, RegistryError};

mod handlers;

pub use handlers::not_found_handler;

const STATUS_PREFIX: &str = "/_status";

/// Maximum request body in bytes (16 MB)
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Content type of envelopes and response bodies.
pub const CBOR_CONTENT_TYPE: &str = "application/cbor";

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct GatewayState {
    registry: Arc<Registry>,
}

impl GatewayState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(Registry::new(config.freshness_window)))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Build the gateway router: the signed request endpoint, status routes,
/// and visitor-facing paths.
pub fn router(state: GatewayState, log_level: tracing::Level) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST])
        .allow_headers(vec![ACCEPT, CONTENT_TYPE, ORIGIN])
        .allow_origin(Any)
        .allow_credentials(false);

    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    Router::new()
        .route("/", post(submit_handler))
        .route(&format!("{STATUS_PREFIX}/livez"), get(handlers::livez_handler))
        .route("/:path", get(view_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
        .layer(cors_layer)
        .layer(trace_layer)
}

/// Bind `config.listen_addr` and serve until `shutdown_rx` fires.
pub async fn run(
    config: Config,
    state: GatewayState,
    shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = ?config.listen_addr, "gateway listening");
    serve(listener, router(state, config.log_level), shutdown_rx).await
}

/// Serve `router` on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

/// POST / with an encoded envelope.
async fn submit_handler(
    State(state): State<GatewayState>,
    body: Bytes,
) -> Result<Response, RegistryError> {
    let reply = state
        .registry()
        .apply(&body, unix_now())
        .map_err(|e| {
            tracing::debug!(status = %e.status(), "rejected request: {}", e);
            e
        })?;
    Ok(([(CONTENT_TYPE, CBOR_CONTENT_TYPE)], reply).into_response())
}

/// GET /{path} serves the published view to visitors.
async fn view_handler(
    State(state): State<GatewayState>,
    Path(path): Path<String>,
    headers: http::HeaderMap,
) -> Response {
    match state.registry().view(&path) {
        Some(PublishedView::Redirect { url }) => (StatusCode::FOUND, [(LOCATION, url)]).into_response(),
        Some(PublishedView::Html { html }) => Html(html).into_response(),
        Some(PublishedView::Raw { mime, bytes }) => ([(CONTENT_TYPE, mime)], bytes).into_response(),
        None => handlers::unpublished(&path, &headers),
    }
}
