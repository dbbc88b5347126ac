//! The generation primitive and its Candle-backed implementation.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML)
//! to run GGUF-quantized language models on CPU with zero internet
//! after the first download. The [`TextGenerator`] trait is the seam
//! the engine locks around; tests substitute stubs for it.

use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama as qlm;
use hf_hub::api::sync::Api;
use neurochat_core::error::EngineError;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// Sampling parameters for one generation call.
#[derive(Debug, Clone)]
pub struct SamplingParams {
    /// New-token budget
    pub max_new_tokens: u32,
    /// Sampling temperature; 0 means greedy decoding
    pub temperature: f64,
    /// Nucleus threshold
    pub top_p: f64,
    /// Penalty > 1 discourages already-generated tokens
    pub repetition_penalty: f32,
    /// N-grams of this size may not repeat; 0 disables
    pub no_repeat_ngram_size: usize,
    /// Sampler seed
    pub seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 150,
            temperature: 0.7,
            top_p: 0.9,
            repetition_penalty: 1.1,
            no_repeat_ngram_size: 3,
            seed: 42,
        }
    }
}

impl From<&neurochat_config::GenerationConfig> for SamplingParams {
    fn from(cfg: &neurochat_config::GenerationConfig) -> Self {
        Self {
            max_new_tokens: cfg.max_new_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            repetition_penalty: cfg.repetition_penalty,
            no_repeat_ngram_size: cfg.no_repeat_ngram_size,
            seed: cfg.seed,
        }
    }
}

/// Unprocessed output of one model invocation.
///
/// Depending on the backend the text may or may not echo the prompt —
/// the sanitizer handles both.
#[derive(Debug, Clone)]
pub struct RawGeneration {
    /// Decoded output text
    pub text: String,
    /// Number of newly generated tokens
    pub token_count: u32,
}

/// The generation primitive the engine serializes access to.
///
/// `&mut self` because model runtimes keep internal caches that are
/// not safe for concurrent invocation; the engine's single-writer lock
/// provides the exclusion.
pub trait TextGenerator: Send {
    fn generate(&mut self, prompt: &str, params: &SamplingParams)
    -> Result<RawGeneration, EngineError>;
}

// ── Well-known model aliases ───────────────────────────────────────────

/// Model presets — friendly aliases that resolve to HuggingFace repos
/// and filenames.
struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    let alias_lower = alias.to_lowercase();
    match alias_lower.as_str() {
        "phi2" | "phi-2" => Some(ModelPreset {
            repo: "TheBloke/phi-2-GGUF",
            gguf_file: "phi-2.Q4_K_M.gguf",
            tokenizer_repo: "microsoft/phi-2",
        }),
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        }),
        "smollm" | "smollm:135m" | "smollm-135m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-135M-Instruct-GGUF",
            gguf_file: "smollm-135m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-135M-Instruct",
        }),
        "qwen:0.5b" | "qwen-0.5b" | "qwen2-0.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-0.5B-Instruct-GGUF",
            gguf_file: "qwen2-0_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-0.5B-Instruct",
        }),
        _ => None,
    }
}

// ── Candle generator ───────────────────────────────────────────────────

/// A GGUF-quantized causal LM running locally via Candle.
pub struct CandleGenerator {
    model: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: u32,
}

impl CandleGenerator {
    /// Load a model by preset alias or GGUF file path.
    ///
    /// Downloads model and tokenizer through the HuggingFace Hub cache
    /// when an alias is given. This runs once at process start.
    pub fn load(model_cfg: &neurochat_config::ModelConfig) -> Result<Self, EngineError> {
        let device = resolve_device(&model_cfg.device);
        let model_id = &model_cfg.model_id;

        if Path::new(model_id).exists() && model_id.ends_with(".gguf") {
            return Self::load_from_path(Path::new(model_id), &device);
        }

        let preset = resolve_preset(model_id).ok_or_else(|| {
            EngineError::ModelNotFound(format!(
                "Unknown model '{model_id}'. Available presets: phi2, tinyllama, \
                 smollm:135m, qwen:0.5b. Or provide a path to a .gguf file."
            ))
        })?;

        info!(
            model = %model_id,
            repo = preset.repo,
            file = preset.gguf_file,
            "Downloading/loading local model"
        );

        let api = Api::new()
            .map_err(|e| EngineError::Download(format!("HuggingFace Hub API init failed: {e}")))?;

        let repo = api.model(preset.repo.to_string());
        let model_path = repo.get(preset.gguf_file).map_err(|e| {
            EngineError::Download(format!(
                "Failed to download '{}' from '{}': {e}",
                preset.gguf_file, preset.repo
            ))
        })?;

        let tokenizer_repo = api.model(preset.tokenizer_repo.to_string());
        let tokenizer_path = tokenizer_repo.get("tokenizer.json").map_err(|e| {
            EngineError::Download(format!(
                "Failed to download tokenizer from '{}': {e}",
                preset.tokenizer_repo
            ))
        })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EngineError::Tokenizer(format!("Failed to load tokenizer: {e}")))?;

        let model = load_gguf_weights(&model_path, &device)?;
        let eos_token_id = detect_eos(&tokenizer);

        info!(eos_token_id, "Local model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_token_id,
        })
    }

    /// Load from an explicit GGUF file path, expecting a
    /// `tokenizer.json` next to it.
    fn load_from_path(path: &Path, device: &Device) -> Result<Self, EngineError> {
        info!(path = %path.display(), "Loading local GGUF model");

        let model = load_gguf_weights(path, device)?;

        let tokenizer_path = path.with_file_name("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(EngineError::Tokenizer(format!(
                "No tokenizer.json found next to {}",
                path.display()
            )));
        }
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EngineError::Tokenizer(format!("Failed to load tokenizer: {e}")))?;

        let eos_token_id = detect_eos(&tokenizer);

        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
            eos_token_id,
        })
    }
}

fn resolve_device(label: &str) -> Device {
    if label != "cpu" {
        warn!(device = label, "Only CPU inference is supported; using cpu");
    }
    Device::Cpu
}

fn load_gguf_weights(path: &Path, device: &Device) -> Result<qlm::ModelWeights, EngineError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| EngineError::ModelUnavailable(format!("Failed to open model file: {e}")))?;

    let gguf = gguf_file::Content::read(&mut file)
        .map_err(|e| EngineError::ModelUnavailable(format!("Failed to parse GGUF file: {e}")))?;

    qlm::ModelWeights::from_gguf(gguf, &mut file, device)
        .map_err(|e| EngineError::ModelUnavailable(format!("Failed to load model weights: {e}")))
}

fn detect_eos(tokenizer: &Tokenizer) -> u32 {
    tokenizer
        .token_to_id("</s>")
        .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
        .or_else(|| tokenizer.token_to_id("<|im_end|>"))
        .or_else(|| tokenizer.token_to_id("<|eot_id|>"))
        .unwrap_or(2) // common EOS id
}

/// Map Candle errors to EngineError.
fn map_candle_err(e: candle_core::Error) -> EngineError {
    EngineError::Generation(format!("Candle inference error: {e}"))
}

impl TextGenerator for CandleGenerator {
    /// Run inference: tokenize → sample tokens → decode.
    ///
    /// Only newly generated tokens are decoded, so the returned text
    /// never echoes the prompt (the sanitizer still guards the case).
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<RawGeneration, EngineError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| EngineError::Tokenizer(format!("Tokenization failed: {e}")))?;

        let prompt_tokens = encoding.get_ids();

        debug!(
            prompt_tokens = prompt_tokens.len(),
            max_new_tokens = params.max_new_tokens,
            temperature = params.temperature,
            "Starting local generation"
        );

        let mut input = Tensor::new(prompt_tokens, &self.device)
            .map_err(map_candle_err)?
            .unsqueeze(0)
            .map_err(map_candle_err)?;

        let mut logits_processor = if params.temperature <= 0.0 {
            LogitsProcessor::new(params.seed, None, None)
        } else {
            LogitsProcessor::new(params.seed, Some(params.temperature), Some(params.top_p))
        };

        let mut generated: Vec<u32> = Vec::new();
        let mut index_pos = 0usize;

        for _ in 0..params.max_new_tokens {
            let seq_len = input.dim(1).map_err(map_candle_err)?;
            let logits = self
                .model
                .forward(&input, index_pos)
                .map_err(map_candle_err)?;
            index_pos += seq_len;

            let logits = logits.squeeze(0).map_err(map_candle_err)?;
            let logits = logits
                .get(logits.dim(0).map_err(map_candle_err)? - 1)
                .map_err(map_candle_err)?;

            let logits = if params.repetition_penalty > 1.0 && !generated.is_empty() {
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    params.repetition_penalty,
                    &generated,
                )
                .map_err(map_candle_err)?
            } else {
                logits
            };

            let logits =
                mask_repeated_ngrams(&logits, &generated, params.no_repeat_ngram_size, &self.device)?;

            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;

            if next_token == self.eos_token_id {
                break;
            }

            generated.push(next_token);

            input = Tensor::new(&[next_token][..], &self.device)
                .map_err(map_candle_err)?
                .unsqueeze(0)
                .map_err(map_candle_err)?;
        }

        let token_count = generated.len() as u32;
        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| EngineError::Tokenizer(format!("Detokenization failed: {e}")))?;

        debug!(completion_tokens = token_count, output_len = text.len(), "Generation complete");

        Ok(RawGeneration { text, token_count })
    }
}

/// Tokens that would complete an n-gram already present in `tokens`.
fn banned_ngram_tokens(tokens: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || tokens.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &tokens[tokens.len() - (n - 1)..];
    let mut banned = Vec::new();
    for window in tokens.windows(n) {
        if &window[..n - 1] == prefix {
            banned.push(window[n - 1]);
        }
    }
    banned
}

/// Mask logits of tokens whose selection would repeat an n-gram.
fn mask_repeated_ngrams(
    logits: &Tensor,
    generated: &[u32],
    ngram_size: usize,
    device: &Device,
) -> Result<Tensor, EngineError> {
    let banned = banned_ngram_tokens(generated, ngram_size);
    if banned.is_empty() {
        return Ok(logits.clone());
    }
    let mut values = logits.to_vec1::<f32>().map_err(map_candle_err)?;
    for token in banned {
        if let Some(v) = values.get_mut(token as usize) {
            *v = f32::NEG_INFINITY;
        }
    }
    let len = values.len();
    Tensor::from_vec(values, len, device).map_err(map_candle_err)
}
