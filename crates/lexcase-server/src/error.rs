//! HTTP error responses. Every error body is `{"detail": ...}`.

use std::any::Any;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lexcase_ai::GatewayError;
use serde_json::json;
use tracing::error;

pub const INTERNAL_ERROR_DETAIL: &str = "Internal server error occurred";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or out-of-bounds request body (422).
    #[error("invalid request: {0}")]
    Validation(String),
    /// Well-formed but empty input (400).
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    /// A component failed to start (503).
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// Core failure; detail is logged, not returned (500).
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl ApiError {
    /// Map a gateway error, logging it. `failure` is the generic 500 detail.
    pub fn from_gateway(err: GatewayError, failure: &'static str) -> Self {
        match err {
            GatewayError::ArtifactUnavailable { gateway, reason } => {
                error!(gateway = %gateway, reason = %reason, "request for unavailable model");
                Self::Unavailable(format!("{} model is unavailable", capitalize(&gateway)))
            }
            e @ GatewayError::PredictionFailure { .. } => {
                error!(error = %e, "{failure}");
                Self::Internal(failure)
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> &str {
        match self {
            Self::Validation(d) | Self::Unavailable(d) => d,
            Self::BadRequest(d) | Self::Internal(d) => d,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Response for a handler that panicked; installed in the catch-panic layer.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(panic = %message, "handler panicked");
    ApiError::Internal(INTERNAL_ERROR_DETAIL).into_response()
}
