//! API module for the pinning server

pub mod error;
pub mod handlers;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::warn;

use error::{ApiError, REQUEST_TIMED_OUT};
use handlers::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Readiness check response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub allowed_domains: usize,
    pub key_id: String,
    pub algorithm: String,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
    })
}

/// Readiness check endpoint
///
/// GET /readiness
///
/// The signing key and whitelist are loaded before the listener binds, so a
/// serving process is always ready.
pub async fn readiness(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    let service = &state.service;

    Json(ReadinessResponse {
        status: "ready".into(),
        allowed_domains: service.matcher().len(),
        key_id: service.signer().key_id().to_string(),
        algorithm: service.signer().algorithm().to_string(),
    })
}

/// Whole-request deadline
///
/// Dropping the handler future on expiry also drops any in-flight certificate
/// fetch. The expired request still gets a `{error, code}` body.
async fn enforce_deadline(State(limit): State<Duration>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(method = %method, path = %path, timeout = ?limit, "Request timed out");
            ApiError::RequestTimeout(REQUEST_TIMED_OUT).into_response()
        }
    }
}

/// Create the API router
///
/// `request_timeout` should exceed the certificate dial timeout so a slow
/// upstream is reported as a retrieval failure rather than a timeout.
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/readiness", get(readiness))
        // Pin issuance
        .route(
            "/v1/pins",
            get(handlers::get_pins).fallback(handlers::method_not_allowed),
        )
        // Middleware
        .layer(middleware::from_fn_with_state(request_timeout, enforce_deadline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
