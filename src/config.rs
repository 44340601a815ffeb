use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Default base URL of the self-hosted Stable Diffusion WebUI. The gradio
/// share link rotates, so deployments override it with STABLE_DIFFUSION_URL.
pub const DEFAULT_DIFFUSION_URL: &str = "https://998cc0affd0b9f5651.gradio.live";

pub const DEFAULT_REPLICATE_URL: &str = "https://api.replicate.com";

/// Runtime configuration, loaded once at startup and passed into the clients.
/// Request handlers never read the environment themselves.
#[derive(Debug, Clone)]
pub struct Config {
    /// Replicate API token. Required; startup fails without it.
    pub replicate_api_token: String,
    pub replicate_base_url: String,
    pub diffusion_base_url: String,
    /// Directory for per-request image/mask artifacts.
    pub temp_dir: PathBuf,
    /// Delay between prediction status checks.
    pub poll_interval: Duration,
    /// Status checks after the initial one before giving up.
    pub max_poll_attempts: u32,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let replicate_api_token = std::env::var("REPLICATE_API_TOKEN")
            .context("REPLICATE_API_TOKEN not found in environment")?;

        let replicate_base_url = std::env::var("REPLICATE_API_BASE")
            .unwrap_or_else(|_| DEFAULT_REPLICATE_URL.to_string());
        let diffusion_base_url = std::env::var("STABLE_DIFFUSION_URL")
            .unwrap_or_else(|_| DEFAULT_DIFFUSION_URL.to_string());
        let temp_dir = std::env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("temp_images"));

        let poll_interval_ms: u64 = std::env::var("REPLICATE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);
        let max_poll_attempts: u32 = std::env::var("REPLICATE_MAX_POLL_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        Ok(Self {
            replicate_api_token,
            replicate_base_url,
            diffusion_base_url,
            temp_dir,
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_poll_attempts,
            port,
        })
    }
}
