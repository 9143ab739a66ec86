use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use dietlens::config::{Cli, Config};
use dietlens::detection::DetectionPipeline;
use dietlens::routes;
use dietlens::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    std::fs::create_dir_all(config.root())?;

    // Check the inference service once; missing pieces degrade to notices
    let pipeline = DetectionPipeline::from_config(&config.detection).await;

    let state = AppState::new(config.clone(), pipeline);
    std::fs::create_dir_all(state.images.captures_dir())?;
    match state.images.pool() {
        Some(pool) => tracing::info!(
            "Sample pool: {} ({} images)",
            pool.dir.display(),
            pool.images.len()
        ),
        None => tracing::warn!(
            "No sample pool found under {}",
            config.root().display()
        ),
    }

    let app = routes::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
