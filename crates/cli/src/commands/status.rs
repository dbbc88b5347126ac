//! `neurochat status` — Show configuration and storage status.

use anyhow::Context;
use neurochat_config::AppConfig;
use neurochat_engine::ChatTemplate;
use neurochat_storage::SqliteStore;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;

    println!("NeuroChat Status");
    println!("================");
    println!("  Config dir:  {}", AppConfig::config_dir().display());
    println!("  Model:       {}", config.model.model_id);
    println!("  Template:    {:?}", ChatTemplate::for_model(&config.model.model_id));
    println!("  Device:      {}", config.model.device);
    println!("  Window:      {} turns", config.context.window);
    println!("  Max tokens:  {}", config.generation.max_new_tokens);
    println!("  Temperature: {}", config.generation.temperature);
    println!("  Database:    {}", config.storage.db_path);
    println!("  Gateway:     {}:{}", config.gateway.host, config.gateway.port);

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — run `neurochat onboard` first");
    }

    match SqliteStore::new(&config.storage.db_path).await {
        Ok(_) => println!("  Database reachable"),
        Err(e) => println!("  Database unreachable: {e}"),
    }

    Ok(())
}
