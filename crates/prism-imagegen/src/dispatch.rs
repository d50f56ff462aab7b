use indexmap::IndexMap;
use prism_config::{ImageGenProviderConfig, ProviderId};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    error::{ErrorKind, ProviderError, Result},
    provider::{ImageProvider, bfl::BflFluxProvider, openai::OpenAiImageProvider},
    types::{GatewayResponse, GenerationRequest},
};

/// Routes generation requests to the adapter registered for their provider
///
/// The table is built once at startup and never changes afterwards.
pub struct Dispatcher {
    providers: IndexMap<ProviderId, Box<dyn ImageProvider>>,
}

impl Dispatcher {
    pub(crate) fn from_providers(providers: impl IntoIterator<Item = Box<dyn ImageProvider>>) -> Self {
        Self {
            providers: providers.into_iter().map(|provider| (provider.id(), provider)).collect(),
        }
    }

    /// Look up the adapter for `id`
    pub(crate) fn dispatch(&self, id: ProviderId) -> Result<&dyn ImageProvider> {
        self.providers
            .get(&id)
            .map(|provider| &**provider)
            .ok_or_else(|| ProviderError::validation(format!("Provider '{id}' is not supported.")))
    }

    /// Providers available on this gateway, in configuration order
    pub fn providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.providers.keys().copied()
    }

    /// Generate images with the requested provider
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GatewayResponse> {
        let id = request.provider();
        tracing::info!(provider = %id, count = request.count(), "image generation requested");

        let result = self.generate_with(id, request).await;

        match &result {
            Ok(response) => tracing::info!(provider = %id, images = response.data.len(), "image generation complete"),
            Err(e) if e.kind() == ErrorKind::Validation => {
                tracing::warn!(provider = %id, error = %e, "image generation rejected");
            }
            Err(e) => {
                tracing::error!(provider = %id, kind = ?e.kind(), status = e.status_hint(), error = %e, "image generation failed");
            }
        }

        result
    }

    async fn generate_with(&self, id: ProviderId, request: &GenerationRequest) -> Result<GatewayResponse> {
        let data = self.dispatch(id)?.generate(request).await?;

        let expected = request.count() as usize;
        if data.len() != expected {
            return Err(ProviderError::internal(format!(
                "Provider '{id}' returned {} image(s), expected {expected}.",
                data.len()
            )));
        }

        Ok(GatewayResponse::success(id, data))
    }
}

/// Builder for constructing the dispatcher from configuration
pub struct DispatcherBuilder<'a> {
    config: &'a prism_config::Config,
}

impl<'a> DispatcherBuilder<'a> {
    pub fn new(config: &'a prism_config::Config) -> Self {
        Self { config }
    }

    pub fn build(self) -> anyhow::Result<Dispatcher> {
        let mut providers: Vec<Box<dyn ImageProvider>> = Vec::new();

        for (&id, provider_config) in &self.config.imagegen.providers {
            tracing::debug!("Initializing image generation provider: {id}");

            let api_key = resolve_api_key(id, provider_config)?;
            let timeout = provider_config.timeout()?;

            let provider: Box<dyn ImageProvider> = match id {
                ProviderId::DallE3 => Box::new(OpenAiImageProvider::new(
                    api_key,
                    provider_config.base_url.as_ref(),
                    provider_config.model.clone(),
                    timeout,
                )?),
                ProviderId::BflFlux => Box::new(BflFluxProvider::new(
                    api_key,
                    provider_config.base_url.as_ref(),
                    timeout,
                    provider_config.poll_interval()?,
                    provider_config.poll_timeout()?,
                )?),
            };

            providers.push(provider);
        }

        if providers.is_empty() {
            tracing::warn!("No image generation providers configured");
        } else {
            tracing::debug!("Dispatcher initialized with {} provider(s)", providers.len());
        }

        Ok(Dispatcher::from_providers(providers))
    }
}

fn resolve_api_key(id: ProviderId, config: &ImageGenProviderConfig) -> anyhow::Result<SecretString> {
    config
        .api_key
        .clone()
        .filter(|key| !key.expose_secret().is_empty())
        .ok_or_else(|| anyhow::anyhow!("API key required for image generation provider '{id}'"))
}
