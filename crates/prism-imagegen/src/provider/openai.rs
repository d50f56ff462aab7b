use std::time::Duration;

use async_trait::async_trait;
use prism_config::ProviderId;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{ImageProvider, error_detail, normalize_base_url};
use crate::{
    error::{ProviderError, Result},
    http_client::http_client,
    types::{GenerationRequest, ImageResult},
};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "dall-e-3";
const DEFAULT_SIZE: &str = "1024x1024";
const DEFAULT_QUALITY: &str = "standard";
const DEFAULT_STYLE: &str = "vivid";

/// Fallback when an error body carries no `error.message`
const NO_DETAILS: &str = "No details provided.";

/// `OpenAI` DALL-E provider, one call returns every image
pub(crate) struct OpenAiImageProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiImageProvider {
    pub fn new(
        api_key: SecretString,
        base_url: Option<&Url>,
        model: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: normalize_base_url(base_url, DEFAULT_BASE_URL),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Wire format for the `OpenAI` image generation API request
#[derive(Debug, Serialize)]
struct OpenAiImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
    style: &'a str,
}

impl<'a> OpenAiImageRequest<'a> {
    fn new(model: &'a str, request: &'a GenerationRequest) -> Self {
        Self {
            model,
            prompt: request.prompt(),
            n: request.count(),
            size: request.param_str("size").unwrap_or(DEFAULT_SIZE),
            quality: request.param_str("quality").unwrap_or(DEFAULT_QUALITY),
            style: request.param_str("style").unwrap_or(DEFAULT_STYLE),
        }
    }
}

/// Wire format for the `OpenAI` image generation API response
#[derive(Deserialize)]
struct OpenAiImageResponse {
    data: Vec<OpenAiImageData>,
}

#[derive(Deserialize)]
struct OpenAiImageData {
    url: Option<String>,
    revised_prompt: Option<String>,
}

/// Pull `error.message` out of an `OpenAI` error body
fn extract_error_message(detail: Option<&Value>) -> &str {
    detail
        .and_then(|body| body.pointer("/error/message"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .unwrap_or(NO_DETAILS)
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImageResult>> {
        let url = format!("{}/images/generations", self.base_url);
        let wire_request = OpenAiImageRequest::new(&self.model, request);

        if request.input_image().is_some() {
            tracing::debug!(provider = %self.id(), "input image ignored, provider is text-to-image only");
        }

        tracing::debug!(
            provider = %self.id(),
            model = %self.model,
            n = request.count(),
            "sending image generation request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.id(), error = %e, "image generation request failed");
                ProviderError::from(e)
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            let message = format!("Error from DALL-E API: {}", extract_error_message(detail.as_ref()));

            tracing::error!(provider = %self.id(), status = %status, "DALL-E API error");

            return Err(ProviderError::upstream(status.as_u16(), message, detail));
        }

        let wire_response: OpenAiImageResponse = response.json().await.map_err(|e| {
            tracing::error!(provider = %self.id(), error = %e, "failed to parse DALL-E response");
            ProviderError::internal(format!("Unexpected response from DALL-E API: {e}"))
        })?;

        let images = wire_response
            .data
            .into_iter()
            .map(|item| {
                let url = item
                    .url
                    .ok_or_else(|| ProviderError::internal("DALL-E API returned an image without a URL."))?;

                Ok(ImageResult::new(url)
                    .with_revised_prompt(item.revised_prompt)
                    .with_metadata("model", self.model.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(provider = %self.id(), images = images.len(), "image generation request complete");

        Ok(images)
    }

    fn id(&self) -> ProviderId {
        ProviderId::DallE3
    }
}
