/// CoHub messaging client - Main entry point
use cohub_core::storage::SledStorage;
use cohub_core::{cli_app, Config, Messenger};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config =
        Config::from_args(&args).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let viewer = config.viewer_id.clone().unwrap_or_else(|| "anon".to_string());
    let data_dir = config
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(".cohub").join(&viewer));
    std::fs::create_dir_all(&data_dir)?;
    let storage = Arc::new(SledStorage::new(&data_dir)?);

    let messenger = Messenger::new(config, storage)
        .map_err(|e| anyhow::anyhow!("Client error: {}", e))?;
    info!("Starting CoHub messaging client");
    info!("   Viewer: {}", messenger.viewer_id());

    cli_app::run(messenger).await
}
