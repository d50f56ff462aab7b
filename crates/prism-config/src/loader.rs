use std::path::Path;

use secrecy::ExposeSecret;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, a provider is
    /// missing its key or has invalid timings, or auth is enabled
    /// without usable keys
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_imagegen_config()?;
        self.validate_auth_config()?;
        Ok(())
    }

    /// Validate provider credentials and polling timings
    fn validate_imagegen_config(&self) -> anyhow::Result<()> {
        if self.imagegen.providers.is_empty() {
            anyhow::bail!("at least one image generation provider must be configured");
        }

        for (id, provider) in &self.imagegen.providers {
            let has_key = provider
                .api_key
                .as_ref()
                .is_some_and(|key| !key.expose_secret().is_empty());

            if !has_key {
                anyhow::bail!("image generation provider '{id}' requires a non-empty api_key");
            }

            provider
                .timeout()
                .map_err(|e| anyhow::anyhow!("provider '{id}': {e}"))?;

            let interval = provider
                .poll_interval()
                .map_err(|e| anyhow::anyhow!("provider '{id}': {e}"))?;
            let budget = provider
                .poll_timeout()
                .map_err(|e| anyhow::anyhow!("provider '{id}': {e}"))?;

            if interval >= budget {
                anyhow::bail!("provider '{id}': poll_interval must be shorter than poll_timeout");
            }
        }

        Ok(())
    }

    /// Validate auth configuration when auth is enabled
    fn validate_auth_config(&self) -> anyhow::Result<()> {
        let Some(ref auth) = self.auth else {
            return Ok(());
        };

        if !auth.enabled {
            return Ok(());
        }

        if !auth.api_keys.iter().any(|key| !key.expose_secret().is_empty()) {
            anyhow::bail!("auth.api_keys must contain at least one non-empty key when auth is enabled");
        }

        if auth.header_name.trim().is_empty() {
            anyhow::bail!("auth.header_name must not be empty");
        }

        Ok(())
    }
}
