pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Gateway service module

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use anyhow::Context;
use modules::logger;
use proxy::upstream::UpstreamClient;
use proxy::{AppState, AxumServer};
use tracing::info;

/// Load configuration, start the gateway and serve until Ctrl+C
pub async fn run() -> anyhow::Result<()> {
    let config = modules::config::load_app_config().context("Failed to load configuration")?;

    // Held until exit so the file appender flushes
    let _log_guard = logger::init_logger(config.log_dir.as_deref());
    modules::config::log_config_summary(&config);

    let upstream = UpstreamClient::new(
        Some(&config.proxy.upstream_proxy),
        config.security.block_ip_literals,
    )?;
    let state = AppState::new(config.security.clone(), Arc::new(upstream));

    let (server, handle) = AxumServer::start(&config.proxy, state)
        .await
        .map_err(anyhow::Error::msg)?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    server.stop();
    handle.await?;
    Ok(())
}
