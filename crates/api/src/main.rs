//! Drowsiness Monitor - Main Entry Point

use api::{init_logging, init_metrics, run, AppConfig, CONFIG_FILE};
use std::path::PathBuf;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = AppConfig::load(&config_path)?;

    init_logging(&config.logging);
    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_path.display());

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus exporter disabled: {}", e);
            None
        }
    };

    run(config, metrics).await?;
    Ok(())
}
