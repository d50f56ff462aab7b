#![allow(clippy::must_use_candidate)]

pub mod auth;
mod env;
pub mod health;
pub mod imagegen;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use auth::*;
pub use health::*;
pub use imagegen::*;
pub use server::*;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level Prism configuration
///
/// Loaded once at startup and handed to each subsystem by reference.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Gateway API key authentication
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    /// Image generation provider configuration
    #[serde(default)]
    pub imagegen: ImageGenConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
