pub(crate) mod bfl;
pub(crate) mod openai;

use async_trait::async_trait;
use prism_config::ProviderId;
use serde_json::Value;

use crate::{
    error::Result,
    types::{GenerationRequest, ImageResult},
};

/// Trait for image generation provider implementations
///
/// On success the returned images number exactly `request.count()` and are
/// in request order. On failure nothing partial is returned.
#[async_trait]
pub(crate) trait ImageProvider: Send + Sync {
    /// Generate the images for the given request
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImageResult>>;

    /// Identifier this provider is registered under
    fn id(&self) -> ProviderId;
}

/// Parse an upstream error body for diagnostics, keeping raw text when it is not JSON
pub(crate) fn error_detail(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }

    Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_owned())))
}

/// Strip trailing slashes so paths can be appended with `format!`
pub(crate) fn normalize_base_url(base_url: Option<&url::Url>, default: &str) -> String {
    base_url
        .map_or(default, url::Url::as_str)
        .trim_end_matches('/')
        .to_owned()
}
