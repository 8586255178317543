use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bui_server::{
    server::{run_server, ServerState},
    ServerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bui_server=debug".into()),
        )
        .init();

    tracing::info!("Burp-UI API server v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    tracing::info!("Listen address: {}", config.listen_addr);

    let state = Arc::new(ServerState::from_config(config).await?);
    run_server(state).await?;

    Ok(())
}

/// Read the configuration file named by `--config` or `BUI_CONFIG`, then
/// apply environment overrides
fn load_config() -> Result<ServerConfig> {
    let path = config_path(std::env::args().skip(1))
        .or_else(|| std::env::var("BUI_CONFIG").ok());

    let mut config = match path {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path);
            ServerConfig::from_file(&path)
                .with_context(|| format!("failed to load configuration {}", path))?
        }
        None => ServerConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn config_path(mut args: impl Iterator<Item = String>) -> Option<String> {
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}
