//! `neurochat onboard` — First-time setup.

use anyhow::Context;
use neurochat_config::AppConfig;

pub async fn run() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("NeuroChat — First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("creating {}", config_dir.display()))?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("Config file already present: {}", config_path.display());
        println!("Edit it directly to change the model or sampling settings.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())
        .with_context(|| format!("writing {}", config_path.display()))?;
    println!("Wrote default config: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  neurochat chat -m \"Hello\"   # one-shot local generation");
    println!("  neurochat serve              # start the HTTP API");

    Ok(())
}
