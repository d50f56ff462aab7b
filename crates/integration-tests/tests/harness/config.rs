//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use prism_config::{AuthConfig, Config, HealthConfig, ImageGenProviderConfig, ProviderId, ServerConfig};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                },
                ..Config::default()
            },
        }
    }

    /// Register the DALL-E provider pointed at a mock backend
    pub fn with_dalle_provider(mut self, base_url: &str) -> Self {
        self.config
            .imagegen
            .providers
            .insert(ProviderId::DallE3, provider_config(base_url, None, None));
        self
    }

    /// Register the BFL FLUX provider pointed at a mock backend
    ///
    /// Polls every `poll_interval` and gives each job `poll_timeout` to finish.
    pub fn with_bfl_provider(mut self, base_url: &str, poll_interval: &str, poll_timeout: &str) -> Self {
        self.config.imagegen.providers.insert(
            ProviderId::BflFlux,
            provider_config(base_url, Some(poll_interval), Some(poll_timeout)),
        );
        self
    }

    /// Require one of `keys` in the `x-api-key` header
    pub fn with_api_keys(mut self, keys: &[&str]) -> Self {
        self.config.auth = Some(AuthConfig {
            enabled: true,
            api_keys: keys.iter().map(|k| SecretString::from((*k).to_owned())).collect(),
            header_name: "x-api-key".to_owned(),
            public_paths: vec!["/health".to_owned()],
        });
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}

fn provider_config(base_url: &str, poll_interval: Option<&str>, poll_timeout: Option<&str>) -> ImageGenProviderConfig {
    ImageGenProviderConfig {
        api_key: Some(SecretString::from("test-key")),
        base_url: Some(base_url.parse().expect("valid URL")),
        model: None,
        timeout: Some("5s".to_owned()),
        poll_interval: poll_interval.map(str::to_owned),
        poll_timeout: poll_timeout.map(str::to_owned),
    }
}
