//! The generation engine: one model handle, one writer at a time.
//!
//! Lifecycle: `load()` once at process start → `generate()` many times
//! → process exit. A failed load is terminal — every subsequent call
//! fails fast with a fixed fallback, no retry, no queuing. Per-call
//! failures are recovered locally into a fallback result; the engine
//! stays ready.

use crate::generator::{CandleGenerator, SamplingParams, TextGenerator};
use crate::sanitize::{ScriptFilter, sanitize};
use crate::template::{ChatTemplate, DEFAULT_SYSTEM_PROMPT};
use neurochat_config::AppConfig;
use neurochat_core::message::{GenerationResult, GenerationStatus, Utterance};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Fixed reply when a generation call fails at runtime.
pub const FALLBACK_REPLY: &str = "Error generating response";

/// Fixed reply when the model never loaded.
pub const UNAVAILABLE_REPLY: &str = "The model is not available right now";

/// Fixed reply for an empty request.
pub const INVALID_INPUT_REPLY: &str = "Please send a message to get a reply";

enum ModelState {
    /// Model loaded; all calls serialize through this lock.
    Ready(Arc<Mutex<Box<dyn TextGenerator>>>),
    /// Load failed or never ran; terminal.
    Unavailable { reason: String },
}

/// Owns the process-wide model handle and serializes generation.
///
/// The mutex wraps only the invocation span: prompt rendering and
/// output sanitization are pure and run outside the lock.
pub struct GenerationEngine {
    state: ModelState,
    template: ChatTemplate,
    system_prompt: String,
    params: SamplingParams,
    filter: ScriptFilter,
}

impl GenerationEngine {
    /// Load the configured model once. A load failure produces an
    /// engine in the terminal unavailable state rather than an error —
    /// the process keeps serving, every generation fails fast.
    pub async fn load(config: &AppConfig) -> Self {
        let model_cfg = config.model.clone();
        let loaded = tokio::task::spawn_blocking(move || CandleGenerator::load(&model_cfg)).await;

        match loaded {
            Ok(Ok(generator)) => {
                info!(model = %config.model.model_id, "Generation engine ready");
                Self::with_generator(config, Box::new(generator))
            }
            Ok(Err(e)) => {
                error!(error = %e, "Model load failed; engine unavailable");
                Self::unavailable(config, e.to_string())
            }
            Err(e) => {
                error!(error = %e, "Model load task panicked; engine unavailable");
                Self::unavailable(config, e.to_string())
            }
        }
    }

    /// Build a ready engine around an injected generator.
    pub fn with_generator(config: &AppConfig, generator: Box<dyn TextGenerator>) -> Self {
        Self {
            state: ModelState::Ready(Arc::new(Mutex::new(generator))),
            template: ChatTemplate::for_model(&config.model.model_id),
            system_prompt: config
                .model
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            params: SamplingParams::from(&config.generation),
            filter: ScriptFilter::from_labels(&config.context.disallowed_scripts),
        }
    }

    /// Build an engine in the terminal unavailable state.
    pub fn unavailable(config: &AppConfig, reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
            template: ChatTemplate::for_model(&config.model.model_id),
            system_prompt: config
                .model
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            params: SamplingParams::from(&config.generation),
            filter: ScriptFilter::from_labels(&config.context.disallowed_scripts),
        }
    }

    /// Whether the model loaded and calls can reach it.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    /// Render the prompt for a context and current utterance.
    ///
    /// Pure and byte-deterministic; exposed for the formatting
    /// determinism guarantee and for debugging.
    pub fn render_prompt(&self, context: &[Utterance], user_utterance: &str) -> String {
        self.template
            .render(&self.system_prompt, context, user_utterance)
    }

    /// Generate one sanitized reply.
    ///
    /// Never returns an error: every failure mode is recovered into a
    /// fixed fallback `GenerationResult` with the status recording what
    /// happened.
    pub async fn generate(
        &self,
        context: &[Utterance],
        user_utterance: &str,
    ) -> GenerationResult {
        let generator = match &self.state {
            ModelState::Ready(generator) => Arc::clone(generator),
            ModelState::Unavailable { reason } => {
                warn!(reason = %reason, "Generation requested while model unavailable");
                return GenerationResult::fallback(
                    UNAVAILABLE_REPLY,
                    GenerationStatus::ModelUnavailable,
                );
            }
        };

        if user_utterance.trim().is_empty() && context.is_empty() {
            return GenerationResult::fallback(INVALID_INPUT_REPLY, GenerationStatus::InvalidInput);
        }

        let prompt = self.render_prompt(context, user_utterance);
        let params = self.params.clone();

        // Invocation span: the lock is held only while the generator
        // runs, and released when the guard drops on any path.
        let task_prompt = prompt.clone();
        let raw = tokio::task::spawn_blocking(move || {
            let mut guard = generator.blocking_lock();
            guard.generate(&task_prompt, &params)
        })
        .await;

        let raw = match raw {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(
                    error = %e,
                    prompt_prefix = %prompt.chars().take(120).collect::<String>(),
                    "Generation call failed"
                );
                return GenerationResult::fallback(FALLBACK_REPLY, GenerationStatus::Failed);
            }
            Err(e) => {
                error!(error = %e, "Generation task panicked");
                return GenerationResult::fallback(FALLBACK_REPLY, GenerationStatus::Failed);
            }
        };

        let text = sanitize(&raw.text, &prompt, self.template, &self.filter);
        GenerationResult::ok(text)
    }
}
