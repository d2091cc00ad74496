//! HTTP transport: JSON-RPC over POST plus progress polling and SSE streams.

pub mod auth;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::mcp::progress::ProgressStore;
use crate::mcp::protocol::error_codes;
use crate::mcp::server::Dispatcher;
use crate::mcp::transport::DEFAULT_MAX_FRAME_LENGTH;
use auth::ApiKeyStore;

/// Interval between SSE progress events.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// HTTP server state.
#[derive(Clone)]
pub struct HttpState {
    dispatcher: Arc<Dispatcher>,
    progress: Arc<ProgressStore>,
    auth: Arc<ApiKeyStore>,
    production: bool,
    progress_interval: Duration,
    shutdown: CancellationToken,
}

impl HttpState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        progress: Arc<ProgressStore>,
        auth: Arc<ApiKeyStore>,
    ) -> Self {
        Self {
            dispatcher,
            progress,
            auth,
            production: false,
            progress_interval: PROGRESS_INTERVAL,
            shutdown: CancellationToken::new(),
        }
    }

    /// Disable key generation over HTTP.
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Token that stops the server and ends open progress streams.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// Build the application router.
///
/// Request bodies share the socket transport's frame limit.
pub fn router(state: HttpState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/jsonrpc", post(handle_jsonrpc))
        .route("/progress/{task_id}", get(progress_stream))
        .route("/tasks/{task_id}", get(task_status))
        .route("/generate_api_key", post(generate_api_key))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(DEFAULT_MAX_FRAME_LENGTH))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_api_key,
        ))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Bind the configured address and serve until the state's shutdown token fires.
pub async fn start_server(config: &Config, state: HttpState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = router(state, &config.allow_origins);

    let addr = config.http_addr();
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    serve(listener, app, shutdown).await
}

/// Serve `app` on an already-bound listener.
pub async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

/// Health check endpoint.
async fn health_check(State(state): State<HttpState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "GIMP AI Integration MCP Server is running",
        "version": crate::VERSION,
        "auth": state.auth.status(),
    }))
}

/// JSON-RPC endpoint.
///
/// Handler failures are HTTP 200 with an error envelope; unparseable or
/// malformed requests are HTTP 400.
async fn handle_jsonrpc(State(state): State<HttpState>, body: Bytes) -> Response {
    let response = state.dispatcher.handle_message(&body).await;
    let status = match &response.error {
        Some(e) if e.code == error_codes::PARSE_ERROR || e.code == error_codes::INVALID_REQUEST => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::OK,
    };
    (status, Json(response)).into_response()
}

/// Push the task's progress record every interval until the client goes away.
///
/// The stream ends once the record is evicted from the store.
async fn progress_stream(
    State(state): State<HttpState>,
    Path(task_id): Path<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    state.progress.get_or_init(&task_id);

    let progress = state.progress.clone();
    let stream = IntervalStream::new(tokio::time::interval(state.progress_interval))
        .map(move |_| progress.get(&task_id))
        .take_while(|record| futures::future::ready(record.is_some()))
        .filter_map(|record| {
            let event = record.and_then(|record| Event::default().json_data(record).ok());
            futures::future::ready(event)
        })
        .map(Ok)
        .take_until(state.shutdown.cancelled_owned());

    Sse::new(stream)
}

/// Current progress record; unknown ids start at zero.
async fn task_status(
    State(state): State<HttpState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    Json(state.progress.get_or_init(&task_id))
}

#[derive(Debug, Deserialize)]
struct GenerateKeyParams {
    name: String,
    #[serde(default = "default_expires_days")]
    expires_days: i64,
}

fn default_expires_days() -> i64 {
    30
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "detail": message.into() }))).into_response()
}

/// Issue a new API key. Development only.
async fn generate_api_key(
    State(state): State<HttpState>,
    Query(params): Query<GenerateKeyParams>,
) -> Response {
    if !state.auth.is_enabled() {
        return detail(StatusCode::BAD_REQUEST, "Authentication is not enabled");
    }
    if state.production {
        return detail(
            StatusCode::FORBIDDEN,
            "This endpoint is disabled in production mode",
        );
    }

    match state.auth.generate(&params.name, params.expires_days) {
        Ok(key) => Json(serde_json::json!({
            "key": key,
            "name": params.name,
            "expires_days": params.expires_days,
        }))
        .into_response(),
        Err(e) => detail(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// Prometheus text exposition.
async fn metrics(State(state): State<HttpState>) -> impl IntoResponse {
    let metrics = state.dispatcher.metrics();
    metrics.set_tracked_tasks(state.progress.len() as u64);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.to_prometheus(),
    )
}
