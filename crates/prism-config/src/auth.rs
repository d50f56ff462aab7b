use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Gateway API key authentication configuration
///
/// Callers present one of `api_keys` in the `header_name` header.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Whether API key auth is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Keys accepted by the gateway
    #[serde(default)]
    pub api_keys: Vec<SecretString>,

    /// Header carrying the key
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Paths that skip authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

impl AuthConfig {
    /// Whether `candidate` matches one of the configured keys
    pub fn accepts(&self, candidate: &str) -> bool {
        self.api_keys
            .iter()
            .any(|key| !key.expose_secret().is_empty() && key.expose_secret() == candidate)
    }
}

fn default_header_name() -> String {
    "x-api-key".to_string()
}

fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string()]
}
