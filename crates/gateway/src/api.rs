//! REST handlers for the NeuroChat API.
//!
//! Endpoints:
//!
//! - `POST   /api/auth/register`      — Create an account
//! - `POST   /api/auth/login`         — Exchange credentials for a bearer token
//! - `GET    /api/auth/me`            — Current account profile
//! - `DELETE /api/auth/delete`        — Delete the account and its data
//! - `POST   /api/chat/session`       — Create a chat session
//! - `GET    /api/chat/sessions`      — List the caller's sessions
//! - `GET    /api/chat/session/{id}`  — Full session history
//! - `DELETE /api/chat/session/{id}`  — Delete a session
//! - `POST   /api/chat/message`       — Send a message, get the reply
//! - `POST   /api/monitoring/metrics` — Record a metric sample
//! - `GET    /api/monitoring/metrics` — Recent metric samples
//! - `GET    /api/monitoring/logs`    — Recent request logs
//! - `GET    /api/status`             — Uptime and usage snapshot
//!
//! Generation failures never surface as HTTP errors: the reply carries
//! the engine's fixed fallback text and a non-`success` status field.

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use neurochat_core::error::StorageError;
use neurochat_core::message::{Role, Session, StoredMessage};
use neurochat_core::observability::{MetricSample, RequestLog};
use neurochat_core::user::{User, UserProfile};
use neurochat_engine::assemble;
use neurochat_telemetry::RequestSpan;

use crate::auth::{self, CurrentUser};
use crate::{SharedState, context_limits};

// ── Errors ────────────────────────────────────────────────────────────────

/// API failures mapped onto HTTP statuses with a `detail` body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            Self::NotFound(d) => (StatusCode::NOT_FOUND, d),
            Self::Internal(d) => {
                tracing::error!(detail = %d, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::AlreadyExists(d) => Self::BadRequest(format!("Already exists: {d}")),
            StorageError::NotFound(d) => Self::NotFound(d),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<neurochat_core::error::AuthError> for ApiError {
    fn from(e: neurochat_core::error::AuthError) -> Self {
        Self::Internal(e.to_string())
    }
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize, Default)]
pub struct SessionCreateRequest {
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
pub struct SessionSummaryDto {
    pub session_id: String,
    pub title: Option<String>,
    pub start_time: String,
}

#[derive(Serialize, Deserialize)]
pub struct MessageDto {
    pub message_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub content: String,
}

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
    pub user_message_id: String,
    pub bot_message_id: String,
    pub bot_content: String,
    pub session_id: String,
}

#[derive(Deserialize)]
pub struct MetricRequest {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub latency: f64,
    pub user_requests: u64,
    #[serde(default)]
    pub additional_info: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

// ── Health & status ───────────────────────────────────────────────────────

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn status_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let uptime_secs = (Utc::now() - state.start_time).num_seconds();
    Json(json!({
        "status": "ok",
        "uptime_secs": uptime_secs,
        "model": state.config.model.model_id,
        "model_ready": state.engine.is_ready(),
        "usage": state.telemetry.snapshot(),
    }))
}

// ── Auth ──────────────────────────────────────────────────────────────────

pub async fn register_handler(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    if req.username.trim().is_empty() || req.password.trim().is_empty() {
        return Err(ApiError::BadRequest("Username and password are required".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".into()));
    }

    let user = User {
        username: req.username.trim().to_string(),
        email: req.email.trim().to_string(),
        password_hash: auth::hash_password(&req.password),
        created_at: Utc::now(),
    };

    match state.store.create_user(&user).await {
        Ok(()) => {
            info!(username = %user.username, "user registered");
            Ok(Json(user.profile()))
        }
        Err(StorageError::AlreadyExists(_)) => Err(ApiError::BadRequest(
            "User with this username or email already exists".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn login_handler(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .store
        .find_user(&req.username)
        .await?
        .filter(|u| auth::verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| ApiError::BadRequest("Invalid username or password".into()))?;

    let access_token = state.tokens.issue(&user.username)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    }))
}

pub async fn me_handler(
    State(state): State<SharedState>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .store
        .find_user(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user.profile()))
}

pub async fn delete_account_handler(
    State(state): State<SharedState>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.store.delete_user(&username).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!(username = %username, "account deleted");
    Ok(Json(json!({ "status": "success", "message": "Account deleted" })))
}

// ── Sessions ──────────────────────────────────────────────────────────────

pub async fn create_session_handler(
    State(state): State<SharedState>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    req: Option<Json<SessionCreateRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut session = Session::new(&username);
    if let Some(Json(body)) = req {
        session.metadata = body.metadata;
    }
    state.store.create_session(&session).await?;
    Ok(Json(json!({ "session_id": session.session_id })))
}

pub async fn list_sessions_handler(
    State(state): State<SharedState>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions: Vec<SessionSummaryDto> = state
        .store
        .list_sessions(&username)
        .await?
        .into_iter()
        .map(|s| SessionSummaryDto {
            session_id: s.session_id,
            title: s.title,
            start_time: s.start_time.to_rfc3339(),
        })
        .collect();
    Ok(Json(json!({ "sessions": sessions })))
}

/// Load a session and check the caller owns it.
async fn owned_session(
    state: &SharedState,
    session_id: &str,
    username: &str,
) -> Result<Session, ApiError> {
    state
        .store
        .get_session(session_id)
        .await?
        .filter(|s| s.user_id == username)
        .ok_or_else(|| ApiError::NotFound("Session not found".into()))
}

pub async fn session_history_handler(
    State(state): State<SharedState>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = owned_session(&state, &session_id, &username).await?;
    let messages: Vec<MessageDto> = state
        .store
        .session_messages(&session.session_id)
        .await?
        .into_iter()
        .map(|m| MessageDto {
            message_id: m.message_id,
            role: m.role.as_str().to_string(),
            content: m.content,
            timestamp: m.timestamp.to_rfc3339(),
        })
        .collect();
    Ok(Json(json!({ "session_id": session.session_id, "messages": messages })))
}

pub async fn delete_session_handler(
    State(state): State<SharedState>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = owned_session(&state, &session_id, &username).await?;
    state.store.delete_session(&session.session_id).await?;
    Ok(Json(json!({ "status": "success", "message": "Session deleted" })))
}

// ── Chat pipeline ─────────────────────────────────────────────────────────

fn message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

/// First characters of the first message become the session title.
fn title_from(content: &str) -> String {
    let trimmed = content.trim();
    match trimmed.char_indices().nth(50) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

pub async fn post_message_handler(
    State(state): State<SharedState>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let started = Instant::now();

    let session_id = match &req.session_id {
        Some(id) => owned_session(&state, id, &username).await?.session_id,
        None => {
            let session = Session::new(&username);
            state.store.create_session(&session).await?;
            session.session_id
        }
    };

    // The history window is fetched before the new message is stored,
    // so the current utterance enters the prompt only as the final turn.
    let limits = context_limits(&state);
    let history = state
        .store
        .recent_messages(&session_id, limits.window)
        .await?;
    let context = assemble(&history, &limits);

    let result = state.engine.generate(&context, &req.content).await;

    let user_message = StoredMessage {
        message_id: message_id(),
        session_id: session_id.clone(),
        user_id: username.clone(),
        role: Role::User,
        content: req.content.clone(),
        timestamp: Utc::now(),
    };
    state.store.save_message(&user_message).await?;
    state
        .store
        .update_session_title(&session_id, &title_from(&req.content))
        .await?;

    let bot_message = StoredMessage {
        message_id: message_id(),
        session_id: session_id.clone(),
        user_id: "assistant".into(),
        role: Role::Assistant,
        content: result.text.clone(),
        timestamp: Utc::now(),
    };
    state.store.save_message(&bot_message).await?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let mut log = RequestLog::new(elapsed_ms, result.word_count as u64, result.status.as_str())
        .with_session(&session_id)
        .with_message(&user_message.message_id);
    if !result.status.is_ok() {
        log.error = Some(result.text.clone());
    }
    state.store.record_log(&log).await?;
    state.telemetry.record(
        RequestSpan::new(elapsed_ms, result.word_count as u64, result.status.as_str())
            .with_session(&session_id),
    );

    info!(
        session_id = %session_id,
        elapsed_ms,
        tokens = result.word_count,
        status = result.status.as_str(),
        "chat message processed"
    );

    Ok(Json(MessageResponse {
        status: result.status.as_str().to_string(),
        user_message_id: user_message.message_id,
        bot_message_id: bot_message.message_id,
        bot_content: result.text,
        session_id,
    }))
}

// ── Monitoring ────────────────────────────────────────────────────────────

pub async fn add_metric_handler(
    State(state): State<SharedState>,
    Json(req): Json<MetricRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut sample = MetricSample::new(req.cpu_usage, req.memory_usage, req.latency, req.user_requests);
    sample.additional_info = req.additional_info;
    state.store.record_metric(&sample).await?;
    Ok(Json(json!({ "status": "success", "metric_id": sample.metric_id })))
}

pub async fn list_metrics_handler(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let metrics = state.store.recent_metrics(query.limit).await?;
    Ok(Json(json!({ "metrics": metrics })))
}

pub async fn list_logs_handler(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let logs = state.store.recent_logs(query.limit).await?;
    Ok(Json(json!({ "logs": logs })))
}

// ── Tests ─────────────────────────────────────────────────────────────────
