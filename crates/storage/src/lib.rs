//! Persistence for NeuroChat: users, sessions, messages, and the
//! observability records (request logs, metric samples).
//!
//! The [`ChatStore`] trait is the narrow interface the rest of the
//! system programs against; [`SqliteStore`] is the production backend.
//! The generation core never writes here — persisting a reply as a
//! message is the request handler's responsibility.

pub mod sqlite;

use async_trait::async_trait;
use neurochat_core::error::StorageError;
use neurochat_core::message::{Session, StoredMessage, Utterance};
use neurochat_core::observability::{MetricSample, RequestLog};
use neurochat_core::user::User;

pub use sqlite::SqliteStore;

/// The document-store collaborator.
///
/// All sequences come back in a defined order: messages ascending by
/// insertion, logs and metrics newest first.
#[async_trait]
pub trait ChatStore: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: &User) -> Result<(), StorageError>;
    async fn find_user(&self, username: &str) -> Result<Option<User>, StorageError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    /// Delete an account and cascade its sessions and messages.
    async fn delete_user(&self, username: &str) -> Result<bool, StorageError>;

    // --- Sessions ---
    async fn create_session(&self, session: &Session) -> Result<(), StorageError>;
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError>;
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StorageError>;
    /// Delete a session and its messages.
    async fn delete_session(&self, session_id: &str) -> Result<bool, StorageError>;
    /// Set the title if none is set yet; later calls are no-ops.
    async fn update_session_title(
        &self,
        session_id: &str,
        title: &str,
    ) -> Result<(), StorageError>;

    // --- Messages ---
    async fn save_message(&self, message: &StoredMessage) -> Result<(), StorageError>;
    /// Full session history, oldest first.
    async fn session_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<StoredMessage>, StorageError>;
    /// The last `limit` messages, oldest first — the history window
    /// the context assembler consumes.
    async fn recent_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Utterance>, StorageError>;

    // --- Observability ---
    async fn record_log(&self, log: &RequestLog) -> Result<(), StorageError>;
    async fn recent_logs(&self, limit: usize) -> Result<Vec<RequestLog>, StorageError>;
    async fn record_metric(&self, metric: &MetricSample) -> Result<(), StorageError>;
    async fn recent_metrics(&self, limit: usize) -> Result<Vec<MetricSample>, StorageError>;
}
