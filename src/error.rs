//! Typed gate errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised by the admission gates. Every variant short-circuits the
/// remaining pipeline steps; none is retried inside this layer.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("missing tenant header")]
    TenantHeaderMissing,
    #[error("no such tenant: {0}")]
    TenantNotFound(String),
    #[error("tenant [{0}] is disabled")]
    TenantDisabled(String),
    #[error("tenant [{0}] has expired")]
    TenantExpired(String),
    #[error("tenant header does not match authenticated principal")]
    TenantMismatch,
    #[error("rate limit exceeded: {count} of {limit} in window")]
    RateLimitExceeded { count: u64, limit: u64 },
    #[error("rate limiter unavailable: {0}")]
    RateLimiterUnavailable(String),
    #[error("no active tenant in request context")]
    NoActiveTenant,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GateError::TenantHeaderMissing => (StatusCode::BAD_REQUEST, "tenant_header_missing"),
            GateError::TenantNotFound(_) => (StatusCode::NOT_FOUND, "tenant_not_found"),
            GateError::TenantDisabled(_) => (StatusCode::FORBIDDEN, "tenant_disabled"),
            GateError::TenantExpired(_) => (StatusCode::FORBIDDEN, "tenant_expired"),
            GateError::TenantMismatch => (StatusCode::FORBIDDEN, "tenant_mismatch"),
            GateError::RateLimitExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            GateError::RateLimiterUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "rate_limiter_unavailable")
            }
            GateError::NoActiveTenant => (StatusCode::INTERNAL_SERVER_ERROR, "no_active_tenant"),
            GateError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        };
        // Backing-store internals stay in the logs; the client sees a generic message.
        let message = match &self {
            GateError::Db(e) => {
                tracing::error!(error = %e, "tenant store failure");
                "database error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
