use anyhow::Result;
use colored::Colorize;
use pricing_service::{config, init_tracing, server};
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// Loads configuration, initializes logging from it and runs the server
/// until a shutdown signal arrives.
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting pricing service...".green());

    let cfg = config::load_config(config_path)?;
    init_tracing(&cfg.server.log_level, &cfg.server.log_format);

    info!(
        "Configuration loaded from {} (data: {}, refresh every {}s)",
        config_path.display(),
        cfg.cache.data_path.display(),
        cfg.cache.refresh_interval_seconds
    );

    server::start_server(cfg).await
}
