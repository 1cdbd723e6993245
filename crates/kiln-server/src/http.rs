//! HTTP API.
//!
//! ## Endpoints
//!
//! - `POST /api/execute` - Run a program, body `{ language, code, input? }`
//! - `GET /api/execute/languages` - Supported language ids
//! - `GET /api/execute/health` - Container runtime reachability
//! - `GET /health` - Liveness

use crate::types::{
    ErrorResponse, ExecuteParams, ExecuteResponse, LanguagesResponse, RuntimeHealthResponse,
};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use kiln_core::Executor;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Headroom for JSON framing and escaping on top of the input limits.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    executor: Arc<Executor>,
    max_input_bytes: usize,
}

impl AppState {
    /// Wrap an executor, rejecting `code` or `input` larger than `max_input_bytes`.
    pub fn new(executor: Arc<Executor>, max_input_bytes: usize) -> Self {
        Self {
            executor,
            max_input_bytes,
        }
    }
}

/// Build the HTTP router.
///
/// The returned router can be served directly with axum or composed
/// into a larger application.
pub fn build_router(state: AppState) -> Router {
    tracing::debug!("Building HTTP router");

    // code and input may each be at the limit
    let body_limit = state
        .max_input_bytes
        .saturating_mul(2)
        .saturating_add(BODY_OVERHEAD_BYTES);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/execute", post(execute_handler))
        .route("/api/execute/languages", get(languages_handler))
        .route("/api/execute/health", get(runtime_health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::debug!(
        body_limit,
        "HTTP router built with routes: /health, /api/execute, /api/execute/languages, /api/execute/health"
    );
    router
}

/// Liveness endpoint.
async fn health_handler() -> impl IntoResponse {
    tracing::trace!("Health check request");
    Json(serde_json::json!({
        "status": "healthy",
        "service": "kiln-server"
    }))
}

async fn execute_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteParams>, JsonRejection>,
) -> Response {
    let Json(params) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected execute request");
            return invalid_input(rejection.body_text());
        }
    };

    if let Err(details) = check_sizes(&params, state.max_input_bytes) {
        tracing::debug!(details = %details, "Rejected oversized execute request");
        return invalid_input(details);
    }

    let result = state.executor.execute(params.into()).await;
    Json(ExecuteResponse { result }).into_response()
}

async fn languages_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(LanguagesResponse {
        languages: state.executor.list_languages(),
    })
}

async fn runtime_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.executor.health_check().await;
    tracing::trace!(healthy, "Runtime health check");
    Json(RuntimeHealthResponse::new(healthy))
}

fn check_sizes(params: &ExecuteParams, limit: usize) -> Result<(), String> {
    if params.code.len() > limit {
        return Err(format!("code exceeds {limit} bytes"));
    }
    if params.input.as_ref().is_some_and(|input| input.len() > limit) {
        return Err(format!("input exceeds {limit} bytes"));
    }
    Ok(())
}

fn invalid_input(details: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::invalid_input(details)),
    )
        .into_response()
}

/// Start the HTTP server.
///
/// This function runs until the server is shut down via the provided
/// shutdown signal.
pub async fn serve(
    state: AppState,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(state);

    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!(%addr, "TCP listener bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
