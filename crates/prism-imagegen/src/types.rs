use base64::Engine;
use prism_config::ProviderId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};

/// Free-form provider-specific parameters
pub type ProviderParams = Map<String, Value>;

/// Largest number of images a single request may ask for
pub const MAX_IMAGES: u32 = 4;

/// Image generation request body as received over HTTP
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationPayload {
    /// Provider identifier (e.g. "dall-e-3", "bfl-flux")
    pub provider: String,
    /// Text description of the desired image
    pub prompt: String,
    /// Number of images to generate
    #[serde(default = "default_n")]
    pub n: u32,
    /// Optional end-user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Provider-specific parameters
    #[serde(default)]
    pub provider_params: ProviderParams,
    /// Base64-encoded input image for image-to-image providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image: Option<String>,
}

/// Default number of images to generate
fn default_n() -> u32 {
    1
}

/// A validated generation request
///
/// Constructed only through [`GenerationRequest::new`] or from a
/// [`GenerationPayload`], so `count` is always within `1..=4`.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    provider: ProviderId,
    prompt: String,
    count: u32,
    provider_params: ProviderParams,
    input_image: Option<Vec<u8>>,
}

impl GenerationRequest {
    /// Build a validated request
    ///
    /// # Errors
    ///
    /// Returns a validation error if the prompt is blank or `count` is not in `1..=4`
    pub fn new(
        provider: ProviderId,
        prompt: impl Into<String>,
        count: u32,
        provider_params: ProviderParams,
        input_image: Option<Vec<u8>>,
    ) -> Result<Self> {
        let prompt = prompt.into();

        if prompt.trim().is_empty() {
            return Err(ProviderError::validation("The 'prompt' field must not be empty."));
        }

        if !(1..=MAX_IMAGES).contains(&count) {
            return Err(ProviderError::validation(format!(
                "The number of images must be between 1 and {MAX_IMAGES}, got {count}."
            )));
        }

        Ok(Self {
            provider,
            prompt,
            count,
            provider_params,
            input_image,
        })
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub const fn count(&self) -> u32 {
        self.count
    }

    pub const fn provider_params(&self) -> &ProviderParams {
        &self.provider_params
    }

    pub fn input_image(&self) -> Option<&[u8]> {
        self.input_image.as_deref()
    }

    /// Look up a string provider parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.provider_params.get(key).and_then(Value::as_str)
    }
}

impl TryFrom<GenerationPayload> for GenerationRequest {
    type Error = ProviderError;

    fn try_from(payload: GenerationPayload) -> Result<Self> {
        let provider: ProviderId = payload
            .provider
            .parse()
            .map_err(|e: prism_config::UnknownProvider| ProviderError::validation(e.to_string()))?;

        let input_image = payload
            .input_image
            .as_deref()
            .map(decode_input_image)
            .transpose()?;

        Self::new(provider, payload.prompt, payload.n, payload.provider_params, input_image)
    }
}

/// Decode a base64 image, accepting an optional `data:<mime>;base64,` prefix
fn decode_input_image(encoded: &str) -> Result<Vec<u8>> {
    let data = encoded
        .split_once(";base64,")
        .filter(|(prefix, _)| prefix.starts_with("data:"))
        .map_or(encoded, |(_, data)| data);

    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| ProviderError::validation(format!("The 'input_image' field is not valid base64: {e}")))
}

/// One generated image
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageResult {
    /// URL of the generated image
    pub image_url: String,
    /// Prompt as rewritten by the provider, if it did so
    #[serde(default)]
    pub revised_prompt: Option<String>,
    /// Provider-attributed metadata (model, upstream request id)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ImageResult {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            revised_prompt: None,
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_revised_prompt(mut self, revised_prompt: Option<String>) -> Self {
        self.revised_prompt = revised_prompt;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}

/// Outcome marker of a [`GatewayResponse`]; failures never produce one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    #[default]
    Success,
}

/// Successful gateway response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayResponse {
    /// Always "success"
    pub status: ResponseStatus,
    /// Provider that produced the images
    pub provider_used: ProviderId,
    /// Images in request order
    pub data: Vec<ImageResult>,
}

impl GatewayResponse {
    pub const fn success(provider_used: ProviderId, data: Vec<ImageResult>) -> Self {
        Self {
            status: ResponseStatus::Success,
            provider_used,
            data,
        }
    }
}
