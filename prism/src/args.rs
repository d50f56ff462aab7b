use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Prism image generation gateway
#[derive(Debug, Parser)]
#[command(name = "prism", about = "Unified gateway for DALL-E and BFL FLUX image generation")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "prism.toml", env = "PRISM_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "PRISM_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter used when the config has no `[telemetry]` section
    #[arg(long, default_value = "info", env = "PRISM_LOG")]
    pub log: String,
}
