mod config;
mod decode;
mod diffusion;
mod models;
mod replicate;
mod routes;

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Missing token is fatal: no request is ever served without it.
    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.temp_dir)?;

    let token_preview = &config.replicate_api_token
        [..std::cmp::min(6, config.replicate_api_token.len())];
    tracing::info!("Using Replicate token: {}...", token_preview);
    tracing::info!("Diffusion endpoint: {}", config.diffusion_base_url);

    let port = config.port;
    let app = routes::router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting server");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
