use std::sync::Arc;

use axum::{
    Json,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderName, StatusCode};
use prism_config::AuthConfig;
use serde::Serialize;

/// Gateway API key rejections
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No key header on the request
    #[error("API Key is missing")]
    MissingKey,

    /// Key header present but not a configured key
    #[error("Invalid API Key")]
    InvalidKey,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: AuthErrorDetails,
}

#[derive(Serialize)]
struct AuthErrorDetails {
    message: String,
    r#type: &'static str,
    code: u16,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let body = AuthErrorBody {
            error: AuthErrorDetails {
                message: self.to_string(),
                r#type: "authentication_error",
                code: status.as_u16(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Static API key check shared by every request
pub struct ApiKeyAuth {
    header: HeaderName,
    config: AuthConfig,
}

impl ApiKeyAuth {
    /// Prepare the key check from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured header name is not a valid HTTP header
    pub fn new(config: AuthConfig) -> anyhow::Result<Self> {
        let header = HeaderName::try_from(config.header_name.as_str())
            .map_err(|e| anyhow::anyhow!("invalid auth.header_name '{}': {e}", config.header_name))?;

        Ok(Self { header, config })
    }

    fn is_public(&self, path: &str) -> bool {
        self.config.public_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn check(&self, request: &Request) -> Result<(), AuthError> {
        let key = request
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingKey)?;

        if self.config.accepts(key) {
            Ok(())
        } else {
            Err(AuthError::InvalidKey)
        }
    }
}

/// Authenticate requests via the configured API key header
///
/// Public paths skip the check.
pub async fn auth_middleware(auth: Arc<ApiKeyAuth>, request: Request, next: Next) -> Response {
    if auth.is_public(request.uri().path()) {
        return next.run(request).await;
    }

    match auth.check(&request) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "API key authentication failed");
            e.into_response()
        }
    }
}
