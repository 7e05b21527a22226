use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::errors::{RegistryError, VerifyError};

use super::models::JobRecord;
use super::registry::JobRegistry;
use super::verifier::{CompletionHandler, InboundVerifier, VerifyOutcome};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub registry: JobRegistry,
    pub verifier: InboundVerifier,
    pub handler: Arc<dyn CompletionHandler>,
}

pub type SharedState = Arc<AppState>;

// ── Request / response payload types ──────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterJobRequest {
    pub job_id: String,
    pub callback_url: String,
    pub metadata: Option<serde_json::Value>,
}

/// The only response that ever carries the signing secret. The caller embeds
/// it in the external job-launch request; afterwards the secret is write-only.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterJobResponse {
    pub job_id: String,
    pub signing_secret: String,
    pub created_at: String,
}

/// Redacted job view for reads: reveals whether a secret exists, never the
/// secret itself.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: String,
    pub callback_url: String,
    pub has_signing_secret: bool,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

impl From<JobRecord> for JobView {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.job_id,
            callback_url: record.callback_url,
            has_signing_secret: record.signing_secret.is_some(),
            metadata: record.metadata,
            created_at: record.created_at,
        }
    }
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        let msg = e.to_string();
        match e {
            RegistryError::JobNotFound { .. } => ApiError::NotFound(msg),
            RegistryError::DuplicateJob { .. } => ApiError::Conflict(msg),
            RegistryError::BadRequest(_) => ApiError::BadRequest(msg),
            RegistryError::Other(_) => ApiError::Internal(msg),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(e: VerifyError) -> Self {
        let msg = e.to_string();
        match e {
            VerifyError::MalformedPayload(_)
            | VerifyError::MissingField(_)
            | VerifyError::UnrecognizedEvent(_)
            | VerifyError::UnrecognizedStatus(_) => ApiError::BadRequest(msg),
            VerifyError::UnknownJob { .. } => ApiError::NotFound(msg),
            VerifyError::MissingSignature
            | VerifyError::InvalidSignature
            | VerifyError::SignatureRequired => ApiError::Unauthorized(msg),
            VerifyError::HandlerFailed(_) | VerifyError::Other(_) => ApiError::Internal(msg),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/jobs", post(register_job))
        .route("/api/jobs/{job_id}", get(get_job))
        .route("/webhooks/agent/{job_id}", post(receive_agent_webhook))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn register_job(
    State(state): State<SharedState>,
    Json(req): Json<RegisterJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let metadata = req.metadata.unwrap_or_else(|| serde_json::json!({}));
    let record = state
        .registry
        .register(&req.job_id, &req.callback_url, metadata)
        .await?;

    let signing_secret = record.signing_secret.clone().ok_or_else(|| {
        ApiError::Internal("Job was registered without a signing secret".to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterJobResponse {
            job_id: record.job_id,
            signing_secret,
            created_at: record.created_at,
        }),
    ))
}

async fn get_job(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.registry.lookup(&job_id).await?;
    Ok(Json(JobView::from(record)))
}

async fn receive_agent_webhook(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let provided_signature = headers
        .get("X-Webhook-Signature")
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .verifier
        .process(&job_id, &body, provided_signature, state.handler.as_ref())
        .await?;

    let status = match outcome {
        VerifyOutcome::Accepted { .. } => "accepted",
        VerifyOutcome::Ignored { .. } => "ignored",
    };
    Ok(Json(serde_json::json!({"status": status})))
}

// ── Tests ─────────────────────────────────────────────────────────────
