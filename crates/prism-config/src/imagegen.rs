use std::{fmt, str::FromStr, time::Duration};

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default call timeout for single-shot providers
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Default wait between two polls of a submitted job
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default wall-clock budget of a submitted job
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Top-level image generation configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageGenConfig {
    /// Provider configurations keyed by provider identifier
    #[serde(default)]
    pub providers: IndexMap<ProviderId, ImageGenProviderConfig>,
}

/// Identifier of a supported image generation provider
///
/// The set is closed: every variant has exactly one adapter implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    /// `OpenAI` DALL-E 3, answers in a single call
    #[serde(rename = "dall-e-3")]
    DallE3,
    /// Black Forest Labs FLUX, submit then poll
    #[serde(rename = "bfl-flux")]
    BflFlux,
}

impl ProviderId {
    /// Every supported provider
    pub const ALL: [Self; 2] = [Self::DallE3, Self::BflFlux];

    /// Wire identifier (e.g. `bfl-flux`)
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DallE3 => "dall-e-3",
            Self::BflFlux => "bfl-flux",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no supported provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Provider '{0}' is not supported.")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_owned()))
    }
}

/// Configuration for a single image generation provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageGenProviderConfig {
    /// API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Upstream model for single-shot providers (e.g. "dall-e-3")
    #[serde(default)]
    pub model: Option<String>,
    /// Per-call timeout (e.g. "120s")
    #[serde(default)]
    pub timeout: Option<String>,
    /// Wait between polls for submit-and-poll providers (e.g. "2s")
    #[serde(default)]
    pub poll_interval: Option<String>,
    /// Wall-clock budget per submitted job (e.g. "5m")
    #[serde(default)]
    pub poll_timeout: Option<String>,
}

impl ImageGenProviderConfig {
    /// Call timeout, defaulting to 120 seconds
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid non-zero duration
    pub fn timeout(&self) -> anyhow::Result<Duration> {
        parse_duration("timeout", self.timeout.as_deref(), DEFAULT_TIMEOUT)
    }

    /// Poll interval, defaulting to 2 seconds
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid non-zero duration
    pub fn poll_interval(&self) -> anyhow::Result<Duration> {
        parse_duration("poll_interval", self.poll_interval.as_deref(), DEFAULT_POLL_INTERVAL)
    }

    /// Per-job polling budget, defaulting to 300 seconds
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid non-zero duration
    pub fn poll_timeout(&self) -> anyhow::Result<Duration> {
        parse_duration("poll_timeout", self.poll_timeout.as_deref(), DEFAULT_POLL_TIMEOUT)
    }
}

fn parse_duration(field: &str, value: Option<&str>, default: Duration) -> anyhow::Result<Duration> {
    let Some(value) = value else {
        return Ok(default);
    };

    let duration =
        duration_str::parse(value).map_err(|e| anyhow::anyhow!("invalid duration for `{field}` '{value}': {e}"))?;

    if duration.is_zero() {
        anyhow::bail!("`{field}` must be greater than zero");
    }

    Ok(duration)
}
