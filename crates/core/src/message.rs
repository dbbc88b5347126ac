//! Utterance, session, and generation-result domain types.
//!
//! These are the value objects that flow through the system:
//! a user sends an utterance → the gateway persists it → the engine
//! assembles recent utterances into a prompt → the generated reply
//! comes back as a `GenerationResult`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a speaker in a conversation.
///
/// The assistant's messages are labeled `assistant` everywhere; `"bot"`
/// is accepted on deserialization for rows written by the older service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    #[serde(alias = "bot")]
    Assistant,
    /// System instructions (persona, behavioral rules)
    System,
}

impl Role {
    /// Parse a stored role string. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" | "bot" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// The canonical storage/wire label for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn in a conversation, attributed to a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Who spoke
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the turn happened
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    /// Create a new user utterance.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant utterance.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new system utterance.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A persisted message: an utterance plus its storage identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique message ID (`msg_<millis>`)
    pub message_id: String,

    /// The session this message belongs to
    pub session_id: String,

    /// The user who owns the session (`"assistant"` for generated replies)
    pub user_id: String,

    /// Who spoke
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the message was stored
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    /// Project down to the transient conversation form.
    pub fn to_utterance(&self) -> Utterance {
        Utterance {
            role: self.role,
            content: self.content.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// A chat session owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID (`sess_<uuid>`)
    pub session_id: String,

    /// Owning username
    pub user_id: String,

    /// Optional title (set once from the first user message)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// When the session started
    pub start_time: DateTime<Utc>,

    /// Session-level metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    /// Create a new session for a user with a fresh `sess_` ID.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            session_id: format!("sess_{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            title: None,
            start_time: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// Outcome classification for one generation call.
///
/// Drives the request-log `status` field. The reply text is always
/// well-formed regardless of status — failures carry a fixed fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// The model produced the reply
    Ok,
    /// Empty context and blank utterance; no model call was made
    InvalidInput,
    /// The model never loaded; the engine fails fast
    ModelUnavailable,
    /// A runtime error during invocation, recovered into the fallback
    Failed,
}

impl GenerationStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::InvalidInput => "invalid_input",
            Self::ModelUnavailable => "model_unavailable",
            Self::Failed => "error",
        }
    }
}

/// The sanitized reply returned by one generation call.
///
/// Created per call and handed back to the caller; the engine retains
/// nothing. Persistence of the reply as a message is the caller's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Sanitized reply text
    pub text: String,

    /// Whitespace-split word count, for observability only
    pub word_count: usize,

    /// How the call concluded
    pub status: GenerationStatus,
}

impl GenerationResult {
    /// A successful result; the word count is derived from the text.
    pub fn ok(text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            text,
            word_count,
            status: GenerationStatus::Ok,
        }
    }

    /// A fixed fallback result with zero count.
    pub fn fallback(text: &str, status: GenerationStatus) -> Self {
        Self {
            text: text.to_string(),
            word_count: 0,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_roundtrip() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let parsed: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Role::Assistant);
    }

    #[test]
    fn bot_alias_deserializes_as_assistant() {
        let parsed: Role = serde_json::from_str("\"bot\"").unwrap();
        assert_eq!(parsed, Role::Assistant);
        assert_eq!(Role::parse("bot"), Some(Role::Assistant));
    }

    #[test]
    fn unknown_role_rejected() {
        assert_eq!(Role::parse("tool"), None);
        assert!(serde_json::from_str::<Role>("\"tool\"").is_err());
    }

    #[test]
    fn session_ids_have_prefix() {
        let session = Session::new("alice");
        assert!(session.session_id.starts_with("sess_"));
        assert_eq!(session.user_id, "alice");
        assert!(session.title.is_none());
    }

    #[test]
    fn generation_result_counts_words() {
        let result = GenerationResult::ok("Hello there, friend");
        assert_eq!(result.word_count, 3);
        assert!(result.status.is_ok());
    }

    #[test]
    fn fallback_has_zero_count() {
        let result =
            GenerationResult::fallback("Error generating response", GenerationStatus::Failed);
        assert_eq!(result.word_count, 0);
        assert_eq!(result.status.as_str(), "error");
    }
}
