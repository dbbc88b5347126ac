//! SQLite backend.
//!
//! A single database file with five tables: `users`, `sessions`,
//! `messages`, `request_logs`, and `metrics`. The schema is created by
//! idempotent migrations at startup. Messages carry an integer rowid
//! alias so insertion order is exact even when timestamps tie.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neurochat_core::error::StorageError;
use neurochat_core::message::{Role, Session, StoredMessage, Utterance};
use neurochat_core::observability::{MetricSample, RequestLog};
use neurochat_core::user::User;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::ChatStore;

/// A production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful
    /// for tests).
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Backend(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection; keep the pool
        // at a single connection so every query sees the same data.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations — creates all tables and indexes.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username      TEXT PRIMARY KEY,
                email         TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                title      TEXT,
                start_time TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("sessions table: {e}")))?;

        // Integer rowid alias gives exact insertion ordering
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request_logs (
                iid           INTEGER PRIMARY KEY AUTOINCREMENT,
                log_id        TEXT UNIQUE NOT NULL,
                session_id    TEXT,
                message_id    TEXT,
                processing_ms INTEGER NOT NULL,
                tokens_used   INTEGER NOT NULL,
                status        TEXT NOT NULL,
                error         TEXT,
                timestamp     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("request_logs table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                metric_id       TEXT UNIQUE NOT NULL,
                cpu_usage       REAL NOT NULL,
                memory_usage    REAL NOT NULL,
                latency         REAL NOT NULL,
                user_requests   INTEGER NOT NULL,
                additional_info TEXT NOT NULL DEFAULT '{}',
                timestamp       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("metrics table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(format!("sessions index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StorageError> {
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StorageError::QueryFailed(format!("session_id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| StorageError::QueryFailed(format!("user_id column: {e}")))?;
        let title: Option<String> = row
            .try_get("title")
            .map_err(|e| StorageError::QueryFailed(format!("title column: {e}")))?;
        let start_time: String = row
            .try_get("start_time")
            .map_err(|e| StorageError::QueryFailed(format!("start_time column: {e}")))?;
        let metadata_json: String = row
            .try_get("metadata")
            .map_err(|e| StorageError::QueryFailed(format!("metadata column: {e}")))?;

        let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();

        Ok(Session {
            session_id,
            user_id,
            title,
            start_time: Self::parse_timestamp(&start_time),
            metadata,
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StorageError> {
        let message_id: String = row
            .try_get("message_id")
            .map_err(|e| StorageError::QueryFailed(format!("message_id column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StorageError::QueryFailed(format!("session_id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| StorageError::QueryFailed(format!("user_id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StorageError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StorageError::QueryFailed(format!("content column: {e}")))?;
        let timestamp: String = row
            .try_get("timestamp")
            .map_err(|e| StorageError::QueryFailed(format!("timestamp column: {e}")))?;

        let role = Role::parse(&role_str)
            .ok_or_else(|| StorageError::QueryFailed(format!("unknown role '{role_str}'")))?;

        Ok(StoredMessage {
            message_id,
            session_id,
            user_id,
            role,
            content,
            timestamp: Self::parse_timestamp(&timestamp),
        })
    }

    fn is_unique_violation(e: &sqlx::Error) -> bool {
        e.as_database_error()
            .map(|d| d.is_unique_violation())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn create_user(&self, user: &User) -> Result<(), StorageError> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if Self::is_unique_violation(&e) => Err(StorageError::AlreadyExists(format!(
                "user '{}' or email '{}'",
                user.username, user.email
            ))),
            Err(e) => Err(StorageError::QueryFailed(format!("insert user: {e}"))),
        }
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("find user: {e}")))?;

        row.map(|row| {
            Ok(User {
                username: row
                    .try_get("username")
                    .map_err(|e| StorageError::QueryFailed(format!("username column: {e}")))?,
                email: row
                    .try_get("email")
                    .map_err(|e| StorageError::QueryFailed(format!("email column: {e}")))?,
                password_hash: row
                    .try_get("password_hash")
                    .map_err(|e| StorageError::QueryFailed(format!("password_hash column: {e}")))?,
                created_at: Self::parse_timestamp(
                    &row.try_get::<String, _>("created_at")
                        .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?,
                ),
            })
        })
        .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT username FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("find user by email: {e}")))?;

        match row {
            Some(row) => {
                let username: String = row
                    .try_get("username")
                    .map_err(|e| StorageError::QueryFailed(format!("username column: {e}")))?;
                self.find_user(&username).await
            }
            None => Ok(None),
        }
    }

    async fn delete_user(&self, username: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete user: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM messages WHERE session_id IN (SELECT session_id FROM sessions WHERE user_id = ?)")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete user messages: {e}")))?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete user sessions: {e}")))?;

        Ok(true)
    }

    async fn create_session(&self, session: &Session) -> Result<(), StorageError> {
        let metadata = serde_json::to_string(&session.metadata)
            .map_err(|e| StorageError::Backend(format!("serialize metadata: {e}")))?;

        sqlx::query(
            "INSERT INTO sessions (session_id, user_id, title, start_time, metadata) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(&session.title)
        .bind(session.start_time.to_rfc3339())
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert session: {e}")))?;

        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get session: {e}")))?;

        row.map(|row| Self::row_to_session(&row)).transpose()
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query("SELECT * FROM sessions WHERE user_id = ? ORDER BY start_time DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("list sessions: {e}")))?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete session: {e}")))?;

        sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete session messages: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_session_title(
        &self,
        session_id: &str,
        title: &str,
    ) -> Result<(), StorageError> {
        // Set once: later calls leave the original title in place.
        sqlx::query("UPDATE sessions SET title = ? WHERE session_id = ? AND title IS NULL")
            .bind(title)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("update title: {e}")))?;

        Ok(())
    }

    async fn save_message(&self, message: &StoredMessage) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO messages (message_id, session_id, user_id, role, content, timestamp) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.message_id)
        .bind(&message.session_id)
        .bind(&message.user_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert message: {e}")))?;

        Ok(())
    }

    async fn session_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE session_id = ? ORDER BY iid ASC")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("session messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn recent_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Utterance>, StorageError> {
        let rows = sqlx::query(
            "SELECT role, content, timestamp FROM messages WHERE session_id = ? ORDER BY iid DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("recent messages: {e}")))?;

        // Newest-first from the query; rows with unknown roles are
        // skipped rather than failing the whole window.
        let mut utterances: Vec<Utterance> = rows
            .iter()
            .filter_map(|row| {
                let role: String = row.try_get("role").ok()?;
                let content: String = row.try_get("content").ok()?;
                let timestamp: String = row.try_get("timestamp").ok()?;
                Some(Utterance {
                    role: Role::parse(&role)?,
                    content,
                    timestamp: Self::parse_timestamp(&timestamp),
                })
            })
            .collect();

        utterances.reverse();
        Ok(utterances)
    }

    async fn record_log(&self, log: &RequestLog) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO request_logs (log_id, session_id, message_id, processing_ms, tokens_used, status, error, timestamp) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.log_id)
        .bind(&log.session_id)
        .bind(&log.message_id)
        .bind(log.processing_ms as i64)
        .bind(log.tokens_used as i64)
        .bind(&log.status)
        .bind(&log.error)
        .bind(log.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert log: {e}")))?;

        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<RequestLog>, StorageError> {
        let rows = sqlx::query("SELECT * FROM request_logs ORDER BY iid DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("recent logs: {e}")))?;

        rows.iter()
            .map(|row| {
                Ok(RequestLog {
                    log_id: row
                        .try_get("log_id")
                        .map_err(|e| StorageError::QueryFailed(format!("log_id column: {e}")))?,
                    session_id: row
                        .try_get("session_id")
                        .map_err(|e| StorageError::QueryFailed(format!("session_id column: {e}")))?,
                    message_id: row
                        .try_get("message_id")
                        .map_err(|e| StorageError::QueryFailed(format!("message_id column: {e}")))?,
                    processing_ms: row
                        .try_get::<i64, _>("processing_ms")
                        .map_err(|e| StorageError::QueryFailed(format!("processing_ms column: {e}")))?
                        as u64,
                    tokens_used: row
                        .try_get::<i64, _>("tokens_used")
                        .map_err(|e| StorageError::QueryFailed(format!("tokens_used column: {e}")))?
                        as u64,
                    status: row
                        .try_get("status")
                        .map_err(|e| StorageError::QueryFailed(format!("status column: {e}")))?,
                    error: row
                        .try_get("error")
                        .map_err(|e| StorageError::QueryFailed(format!("error column: {e}")))?,
                    timestamp: Self::parse_timestamp(
                        &row.try_get::<String, _>("timestamp").map_err(|e| {
                            StorageError::QueryFailed(format!("timestamp column: {e}"))
                        })?,
                    ),
                })
            })
            .collect()
    }

    async fn record_metric(&self, metric: &MetricSample) -> Result<(), StorageError> {
        let info = serde_json::to_string(&metric.additional_info)
            .map_err(|e| StorageError::Backend(format!("serialize metric info: {e}")))?;

        sqlx::query(
            "INSERT INTO metrics (metric_id, cpu_usage, memory_usage, latency, user_requests, additional_info, timestamp) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&metric.metric_id)
        .bind(metric.cpu_usage)
        .bind(metric.memory_usage)
        .bind(metric.latency)
        .bind(metric.user_requests as i64)
        .bind(info)
        .bind(metric.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert metric: {e}")))?;

        Ok(())
    }

    async fn recent_metrics(&self, limit: usize) -> Result<Vec<MetricSample>, StorageError> {
        let rows = sqlx::query("SELECT * FROM metrics ORDER BY iid DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("recent metrics: {e}")))?;

        rows.iter()
            .map(|row| {
                let info_json: String = row
                    .try_get("additional_info")
                    .map_err(|e| StorageError::QueryFailed(format!("additional_info column: {e}")))?;
                Ok(MetricSample {
                    metric_id: row
                        .try_get("metric_id")
                        .map_err(|e| StorageError::QueryFailed(format!("metric_id column: {e}")))?,
                    cpu_usage: row
                        .try_get("cpu_usage")
                        .map_err(|e| StorageError::QueryFailed(format!("cpu_usage column: {e}")))?,
                    memory_usage: row
                        .try_get("memory_usage")
                        .map_err(|e| StorageError::QueryFailed(format!("memory_usage column: {e}")))?,
                    latency: row
                        .try_get("latency")
                        .map_err(|e| StorageError::QueryFailed(format!("latency column: {e}")))?,
                    user_requests: row
                        .try_get::<i64, _>("user_requests")
                        .map_err(|e| StorageError::QueryFailed(format!("user_requests column: {e}")))?
                        as u64,
                    additional_info: serde_json::from_str(&info_json).unwrap_or_default(),
                    timestamp: Self::parse_timestamp(
                        &row.try_get::<String, _>("timestamp").map_err(|e| {
                            StorageError::QueryFailed(format!("timestamp column: {e}"))
                        })?,
                    ),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    fn test_user(name: &str) -> User {
        User {
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "salt$hash".into(),
            created_at: Utc::now(),
        }
    }

    fn test_message(session_id: &str, role: Role, content: &str) -> StoredMessage {
        StoredMessage {
            message_id: format!("msg_{}", Utc::now().timestamp_millis()),
            session_id: session_id.into(),
            user_id: if role == Role::Assistant {
                "assistant".into()
            } else {
                "alice".into()
            },
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn user_roundtrip() {
        let store = store().await;
        store.create_user(&test_user("alice")).await.unwrap();

        let found = store.find_user("alice").await.unwrap().unwrap();
        assert_eq!(found.email, "alice@example.com");

        let by_email = store
            .find_user_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.username, "alice");

        assert!(store.find_user("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_user_rejected() {
        let store = store().await;
        store.create_user(&test_user("alice")).await.unwrap();
        let err = store.create_user(&test_user("alice")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn delete_user_cascades() {
        let store = store().await;
        store.create_user(&test_user("alice")).await.unwrap();
        let session = Session::new("alice");
        store.create_session(&session).await.unwrap();
        store
            .save_message(&test_message(&session.session_id, Role::User, "hi"))
            .await
            .unwrap();

        assert!(store.delete_user("alice").await.unwrap());
        assert!(store.get_session(&session.session_id).await.unwrap().is_none());
        assert!(store
            .session_messages(&session.session_id)
            .await
            .unwrap()
            .is_empty());

        assert!(!store.delete_user("alice").await.unwrap());
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let store = store().await;
        let session = Session::new("alice");
        store.create_session(&session).await.unwrap();

        let found = store.get_session(&session.session_id).await.unwrap().unwrap();
        assert_eq!(found.user_id, "alice");
        assert!(found.title.is_none());

        let listed = store.list_sessions("alice").await.unwrap();
        assert_eq!(listed.len(), 1);

        assert!(store.delete_session(&session.session_id).await.unwrap());
        assert!(store.get_session(&session.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn title_set_once() {
        let store = store().await;
        let session = Session::new("alice");
        store.create_session(&session).await.unwrap();

        store
            .update_session_title(&session.session_id, "First question")
            .await
            .unwrap();
        store
            .update_session_title(&session.session_id, "Second question")
            .await
            .unwrap();

        let found = store.get_session(&session.session_id).await.unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("First question"));
    }

    #[tokio::test]
    async fn messages_keep_insertion_order() {
        let store = store().await;
        let session = Session::new("alice");
        store.create_session(&session).await.unwrap();

        for i in 0..6 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store
                .save_message(&test_message(&session.session_id, role, &format!("m{i}")))
                .await
                .unwrap();
        }

        let all = store.session_messages(&session.session_id).await.unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].content, "m0");
        assert_eq!(all[5].content, "m5");
    }

    #[tokio::test]
    async fn recent_messages_returns_window_ascending() {
        let store = store().await;
        let session = Session::new("alice");
        store.create_session(&session).await.unwrap();

        for i in 0..8 {
            store
                .save_message(&test_message(&session.session_id, Role::User, &format!("m{i}")))
                .await
                .unwrap();
        }

        let recent = store.recent_messages(&session.session_id, 5).await.unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "m3");
        assert_eq!(recent[4].content, "m7");
    }

    #[tokio::test]
    async fn legacy_bot_role_loads_as_assistant() {
        let store = store().await;
        let session = Session::new("alice");
        store.create_session(&session).await.unwrap();

        sqlx::query(
            "INSERT INTO messages (message_id, session_id, user_id, role, content, timestamp) VALUES ('msg_1', ?, 'bot', 'bot', 'old reply', ?)",
        )
        .bind(&session.session_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&store.pool)
        .await
        .unwrap();

        let recent = store.recent_messages(&session.session_id, 5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn logs_and_metrics_roundtrip() {
        let store = store().await;

        for i in 0..3 {
            let log = RequestLog::new(100 + i, 10, "success").with_session("sess_x");
            store.record_log(&log).await.unwrap();
        }
        let logs = store.recent_logs(2).await.unwrap();
        assert_eq!(logs.len(), 2);
        // Newest first
        assert_eq!(logs[0].processing_ms, 102);

        store
            .record_metric(&MetricSample::new(45.2, 68.7, 0.8, 120))
            .await
            .unwrap();
        let metrics = store.recent_metrics(10).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].user_requests, 120);
    }

    #[tokio::test]
    async fn on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let path_str = path.to_str().unwrap();

        {
            let store = SqliteStore::new(path_str).await.unwrap();
            store.create_user(&test_user("alice")).await.unwrap();
        }

        let store = SqliteStore::new(path_str).await.unwrap();
        assert!(store.find_user("alice").await.unwrap().is_some());
    }
}
