//! `neurochat chat` — Interactive or single-message local generation.
//!
//! Talks to the engine directly, no server and no persistence; the
//! conversation window lives in process memory for the session.

use anyhow::Context;
use neurochat_config::AppConfig;
use neurochat_core::message::Utterance;
use neurochat_engine::{ContextLimits, GenerationEngine, assemble};
use std::io::{BufRead, Write};

pub async fn run(message: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let limits = ContextLimits::from(&config.context);

    eprintln!("Loading model '{}'...", config.model.model_id);
    let engine = GenerationEngine::load(&config).await;
    if !engine.is_ready() {
        anyhow::bail!(
            "Model '{}' failed to load — check the model id in {} or pass a .gguf path",
            config.model.model_id,
            AppConfig::config_dir().join("config.toml").display()
        );
    }

    if let Some(msg) = message {
        let result = engine.generate(&[], &msg).await;
        println!("{}", result.text);
        return Ok(());
    }

    // Interactive mode: the rolling window is assembled fresh each turn.
    println!("NeuroChat interactive — empty line or Ctrl-D to exit\n");
    let stdin = std::io::stdin();
    let mut history: Vec<Utterance> = Vec::new();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        let context = assemble(&history, &limits);
        let result = engine.generate(&context, line).await;
        println!("bot> {}\n", result.text);

        history.push(Utterance::user(line));
        history.push(Utterance::assistant(&result.text));
    }

    Ok(())
}
