//! Request and response types for the sv-daemon HTTP endpoints.
//!
//! The `POST /v1/validate` body is [`sv_runtime::ValidationRequest`]; the
//! run responses are [`crate::state::RunRecord`].

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response except a fatal run (422), which carries
/// the run itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "configuration" | "secret_unavailable" | "auth" | "internal" | "not_found"
    pub kind: String,
}
