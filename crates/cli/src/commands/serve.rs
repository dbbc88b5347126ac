//! `neurochat serve` — Start the HTTP gateway server.

use anyhow::Context;
use neurochat_config::AppConfig;

pub async fn run(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;

    if let Some(port) = port {
        config.gateway.port = port;
    }

    neurochat_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("gateway failed: {e}"))
}
