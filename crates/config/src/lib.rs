//! Configuration loading, validation, and management for NeuroChat.
//!
//! Loads configuration from `~/.neurochat/config.toml` with environment
//! variable overrides. Validates all settings at startup; the resulting
//! `AppConfig` is read once and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.neurochat/config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Model selection and persona
    #[serde(default)]
    pub model: ModelConfig,

    /// Sampling knobs for the generation step
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Conversation-context assembly limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Token issuance settings
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Which model to load and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Preset alias (`"phi2"`, `"tinyllama"`, …) or a path to a GGUF file
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Compute target. Only `"cpu"` is supported.
    #[serde(default = "default_device")]
    pub device: String,

    /// Override the built-in assistant persona block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_model_id() -> String {
    "phi2".into()
}
fn default_device() -> String {
    "cpu".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            device: default_device(),
            system_prompt: None,
        }
    }
}

/// Sampling parameters handed to the generation primitive.
///
/// These are configuration knobs, not hidden constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// New-token budget per call
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// Sampling temperature; 0 disables sampling (greedy)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Nucleus sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Penalty applied to already-generated tokens (> 1 discourages)
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    /// Size of n-grams that must not repeat; 0 disables the check
    #[serde(default = "default_no_repeat_ngram")]
    pub no_repeat_ngram_size: usize,

    /// Seed for the sampler, for reproducible runs
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_max_new_tokens() -> u32 {
    150
}
fn default_temperature() -> f64 {
    0.7
}
fn default_top_p() -> f64 {
    0.9
}
fn default_repetition_penalty() -> f32 {
    1.1
}
fn default_no_repeat_ngram() -> usize {
    3
}
fn default_seed() -> u64 {
    42
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            no_repeat_ngram_size: default_no_repeat_ngram(),
            seed: default_seed(),
        }
    }
}

/// Limits applied while assembling conversation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// How many prior turns to retain
    #[serde(default = "default_window")]
    pub window: usize,

    /// Per-message truncation limit, in characters
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Unicode scripts stripped from replies (`"cyrillic"`, `"han"`)
    #[serde(default)]
    pub disallowed_scripts: Vec<String>,
}

fn default_window() -> usize {
    5
}
fn default_max_content_length() -> usize {
    300
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            max_content_length: default_max_content_length(),
            disallowed_scripts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; `":memory:"` for an ephemeral store
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "neurochat.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// The single origin allowed by CORS
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_allowed_origin() -> String {
    "http://localhost:3000".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for signing bearer tokens
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Token lifetime in minutes
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: u64,
}

fn default_token_secret() -> String {
    "change_me".into()
}
fn default_token_ttl() -> u64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            token_ttl_minutes: default_token_ttl(),
        }
    }
}

fn redact(_: &str) -> &'static str {
    "[REDACTED]"
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &redact(&self.token_secret))
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("generation", &self.generation)
            .field("context", &self.context)
            .field("storage", &self.storage)
            .field("gateway", &self.gateway)
            .field("auth", &self.auth)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (`~/.neurochat/config.toml`).
    ///
    /// Environment variable overrides, highest priority:
    /// - `NEUROCHAT_MODEL` — model preset/path
    /// - `NEUROCHAT_DB` — SQLite path
    /// - `NEUROCHAT_TOKEN_SECRET` — token signing key
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(model) = std::env::var("NEUROCHAT_MODEL") {
            config.model.model_id = model;
        }
        if let Ok(db) = std::env::var("NEUROCHAT_DB") {
            config.storage.db_path = db;
        }
        if let Ok(secret) = std::env::var("NEUROCHAT_TOKEN_SECRET") {
            config.auth.token_secret = secret;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".neurochat")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be between 0.0 and 1.0".into(),
            ));
        }
        if self.generation.repetition_penalty < 1.0 {
            return Err(ConfigError::ValidationError(
                "generation.repetition_penalty must be >= 1.0".into(),
            ));
        }
        if self.generation.max_new_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_new_tokens must be > 0".into(),
            ));
        }
        if self.context.window == 0 {
            return Err(ConfigError::ValidationError(
                "context.window must be > 0".into(),
            ));
        }
        if self.context.max_content_length == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_content_length must be > 0".into(),
            ));
        }
        for script in &self.context.disallowed_scripts {
            if !matches!(script.as_str(), "cyrillic" | "han") {
                return Err(ConfigError::ValidationError(format!(
                    "unknown script '{script}' in context.disallowed_scripts"
                )));
            }
        }
        Ok(())
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.model_id, "phi2");
        assert_eq!(config.context.window, 5);
        assert_eq!(config.context.max_content_length, 300);
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.model_id, config.model.model_id);
        assert_eq!(parsed.generation.max_new_tokens, config.generation.max_new_tokens);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            generation: GenerationConfig {
                temperature: 5.0,
                ..GenerationConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn low_repetition_penalty_rejected() {
        let config = AppConfig {
            generation: GenerationConfig {
                repetition_penalty: 0.5,
                ..GenerationConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_window_rejected() {
        let config = AppConfig {
            context: ContextConfig {
                window: 0,
                ..ContextConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_script_rejected() {
        let config = AppConfig {
            context: ContextConfig {
                disallowed_scripts: vec!["klingon".into()],
                ..ContextConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().model.model_id, "phi2");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[model]
model_id = "tinyllama"

[generation]
temperature = 0.4
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.model_id, "tinyllama");
        assert_eq!(config.generation.temperature, 0.4);
        assert_eq!(config.generation.top_p, 0.9);
        assert_eq!(config.context.window, 5);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model]\nmodel_id = \"tinyllama\"\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model.model_id, "tinyllama");
    }

    #[test]
    fn invalid_toml_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml [[").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_values_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[generation]\ntemperature = 9.0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn auth_secret_redacted_in_debug() {
        let config = AppConfig::default();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("change_me"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("phi2"));
        assert!(toml_str.contains("max_new_tokens"));
    }
}
