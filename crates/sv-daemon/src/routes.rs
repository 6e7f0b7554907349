//! Axum router and HTTP handlers for sv-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers so tests can drive the bare router.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sv_runtime::{RunError, ValidationRequest};

use crate::{
    api_types::{ErrorResponse, HealthResponse},
    state::{AppState, Trigger},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/validate", post(validate))
        .route("/v1/runs/latest", get(runs_latest))
        .with_state(state)
}

fn error_response(status: StatusCode, kind: &str, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            kind: kind.to_string(),
        }),
    )
        .into_response()
}

/// 400 configuration, 503 secret/auth, 500 internal.
fn run_error_status(e: &RunError) -> StatusCode {
    match e {
        RunError::Configuration(_) => StatusCode::BAD_REQUEST,
        RunError::SecretUnavailable(_) | RunError::Auth { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RunError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/validate
// ---------------------------------------------------------------------------

/// Run one validation synchronously.
///
/// 200 clean or weekly, 422 fatal (body is still the run), 400 for a
/// malformed body or configuration error, 503 when the stores could not be
/// reached with the configured credentials.
pub(crate) async fn validate(
    State(st): State<Arc<AppState>>,
    body: Result<Json<ValidationRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rej) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "configuration",
                format!("CONFIG_INVALID: request body: {}", rej.body_text()),
            )
        }
    };

    match st.execute(&req, Trigger::Http).await {
        Ok(record) => {
            let status = if record.outcome.is_fatal() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::OK
            };
            (status, Json(record)).into_response()
        }
        Err(e) => error_response(run_error_status(&e), e.kind(), e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/runs/latest
// ---------------------------------------------------------------------------

pub(crate) async fn runs_latest(State(st): State<Arc<AppState>>) -> Response {
    match st.latest.read().await.clone() {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not_found", "no completed run yet".to_string()),
    }
}
