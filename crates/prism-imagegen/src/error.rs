use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Status hint used when the upstream gave us no status of its own
const GENERIC_UPSTREAM_STATUS: u16 = 502;

/// Category of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or unsupported request shape, detected before any network call
    Validation,
    /// The provider rejected or failed the operation
    Upstream,
    /// A job exceeded its polling budget
    Timeout,
    /// The provider behaved unexpectedly (e.g. success without a result)
    Internal,
}

/// Uniform failure returned by every adapter
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    kind: ErrorKind,
    status_hint: u16,
    message: String,
    provider_detail: Option<Value>,
}

impl ProviderError {
    /// Request is malformed or unsupported
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            status_hint: 400,
            message: message.into(),
            provider_detail: None,
        }
    }

    /// Upstream answered with a non-success HTTP status
    pub fn upstream(status: u16, message: impl Into<String>, detail: Option<Value>) -> Self {
        Self {
            kind: ErrorKind::Upstream,
            status_hint: status,
            message: message.into(),
            provider_detail: detail,
        }
    }

    /// Upstream failed without an HTTP status of its own (transport error,
    /// failed job status)
    pub fn upstream_failure(message: impl Into<String>, detail: Option<Value>) -> Self {
        Self::upstream(GENERIC_UPSTREAM_STATUS, message, detail)
    }

    /// Job did not reach a terminal upstream status within its budget
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            status_hint: 504,
            message: message.into(),
            provider_detail: None,
        }
    }

    /// Provider contract was broken
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            status_hint: 500,
            message: message.into(),
            provider_detail: None,
        }
    }

    /// Attach the raw upstream payload for diagnostics
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.provider_detail = Some(detail);
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub const fn status_hint(&self) -> u16 {
        self.status_hint
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn provider_detail(&self) -> Option<&Value> {
        self.provider_detail.as_ref()
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Upstream => StatusCode::from_u16(self.status_hint)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string for the response
    pub const fn error_type(&self) -> &'static str {
        match self.kind {
            ErrorKind::Validation => "invalid_request_error",
            ErrorKind::Upstream => "upstream_error",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::upstream_failure(format!("Upstream call timed out: {e}"), None);
        }
        if e.is_decode() {
            return Self::internal(format!("Unexpected upstream response body: {e}"));
        }
        match e.status() {
            Some(status) => Self::upstream(status.as_u16(), e.to_string(), None),
            None => Self::upstream_failure(format!("Failed to reach upstream: {e}"), None),
        }
    }
}

/// Error response format compatible with `OpenAI` API
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<Value>,
}

impl IntoResponse for ProviderError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = ErrorResponse {
            error: ErrorDetails {
                r#type: self.error_type().to_string(),
                code: status.as_u16(),
                message: self.message,
                detail: self.provider_detail,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
