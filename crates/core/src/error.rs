//! Error types for the NeuroChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all NeuroChat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation engine errors ---
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Auth errors ---
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors inside the generation engine.
///
/// These never escape a `generate` call — the engine recovers each into
/// a fixed fallback `GenerationResult` and logs the detail.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Model not loaded: {0}")]
    ModelUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Unknown model: {0}")]
    ModelNotFound(String),

    #[error("Model download failed: {0}")]
    Download(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Backend(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("User not found: {0}")]
    UserNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_displays_correctly() {
        let err = Error::Engine(EngineError::ModelUnavailable("load failed at startup".into()));
        assert!(err.to_string().contains("Model not loaded"));
        assert!(err.to_string().contains("load failed"));
    }

    #[test]
    fn storage_error_displays_correctly() {
        let err = Error::Storage(StorageError::NotFound("sess_123".into()));
        assert!(err.to_string().contains("sess_123"));
    }

    #[test]
    fn auth_error_from_conversion() {
        let err: Error = AuthError::TokenExpired.into();
        assert!(matches!(err, Error::Auth(AuthError::TokenExpired)));
    }
}
