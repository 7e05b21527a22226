//! Inbound webhook verification pipeline.
//!
//! Validates shape, authenticates the sender against the registered signing
//! secret, and hands accepted terminal events to a completion handler. Every
//! rejection is a typed [`VerifyError`] that the HTTP layer maps onto a
//! status code.

use anyhow::Result;
use async_trait::async_trait;

use crate::errors::{RegistryError, VerifyError};

use super::models::{AgentStatus, JobRecord, STATUS_CHANGE_EVENT, StatusChangeEvent};
use super::notifier::CompletionNotifier;
use super::registry::JobRegistry;
use super::signature;

/// Receives accepted terminal events for downstream processing.
/// Real implementation: `RelayHandler`. Tests record invocations.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn on_completion(&self, job: &JobRecord, event: &StatusChangeEvent) -> Result<()>;
}

/// Default handler: relays the terminal event to the job's registered
/// callback URL through the [`CompletionNotifier`]. Relay delivery is
/// best-effort, so a failed callback never fails the inbound request.
pub struct RelayHandler {
    notifier: CompletionNotifier,
}

impl RelayHandler {
    pub fn new(notifier: CompletionNotifier) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl CompletionHandler for RelayHandler {
    async fn on_completion(&self, job: &JobRecord, event: &StatusChangeEvent) -> Result<()> {
        self.notifier.notify_job(job, event).await;
        Ok(())
    }
}

/// Result of processing an inbound status webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Non-terminal status; acknowledged without any downstream action.
    Ignored { status: AgentStatus },
    /// Terminal event accepted and handed to the completion handler.
    /// `authenticated` is false only on the permissive no-secret path.
    Accepted { authenticated: bool },
}

/// Validates and authenticates inbound status webhooks.
#[derive(Clone)]
pub struct InboundVerifier {
    registry: JobRegistry,
    require_signature: bool,
}

impl InboundVerifier {
    pub fn new(registry: JobRegistry, require_signature: bool) -> Self {
        Self {
            registry,
            require_signature,
        }
    }

    /// Process one inbound webhook.
    ///
    /// `body` must be the raw request bytes as received; the signature is
    /// verified over exactly these bytes, never a re-serialization. Checks
    /// run in a fixed order: payload shape, non-terminal short-circuit,
    /// job lookup by the path id, signature, then the handler.
    pub async fn process(
        &self,
        job_id: &str,
        body: &[u8],
        provided_signature: Option<&str>,
        handler: &dyn CompletionHandler,
    ) -> Result<VerifyOutcome, VerifyError> {
        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| VerifyError::MalformedPayload(e.to_string()))?;

        let event_name = required_str(&raw, "event")?;
        required_str(&raw, "timestamp")?;
        let body_id = required_str(&raw, "id")?;
        let status_str = required_str(&raw, "status")?;

        if event_name != STATUS_CHANGE_EVENT {
            return Err(VerifyError::UnrecognizedEvent(event_name.to_string()));
        }
        let status = status_str
            .parse::<AgentStatus>()
            .map_err(|_| VerifyError::UnrecognizedStatus(status_str.to_string()))?;

        // The path id is authoritative; the body id is informational only.
        if body_id != job_id {
            tracing::warn!(
                target: "webhook_verify",
                job_id = %job_id,
                body_id = %body_id,
                "Body id does not match path id, trusting the path"
            );
        }

        if !status.is_terminal() {
            tracing::info!(
                target: "webhook_verify",
                job_id = %job_id,
                status = %status,
                "Acknowledged non-terminal status change"
            );
            return Ok(VerifyOutcome::Ignored { status });
        }

        let job = match self.registry.lookup(job_id).await {
            Ok(job) => job,
            Err(RegistryError::JobNotFound { job_id }) => {
                return Err(VerifyError::UnknownJob { job_id });
            }
            Err(e) => return Err(VerifyError::Other(e.into())),
        };

        let authenticated = match job.signing_secret.as_deref() {
            Some(secret) => {
                let provided = match provided_signature {
                    Some(provided) => provided,
                    None => {
                        tracing::warn!(
                            target: "webhook_verify",
                            job_id = %job_id,
                            "Rejected unsigned event for a job with a signing secret"
                        );
                        return Err(VerifyError::MissingSignature);
                    }
                };
                if !signature::verify(secret, body, provided) {
                    tracing::warn!(
                        target: "webhook_verify",
                        job_id = %job_id,
                        "Rejected event with invalid signature"
                    );
                    return Err(VerifyError::InvalidSignature);
                }
                true
            }
            None if self.require_signature => {
                tracing::warn!(
                    target: "webhook_verify",
                    job_id = %job_id,
                    "Rejected event for a job with no signing secret (strict mode)"
                );
                return Err(VerifyError::SignatureRequired);
            }
            None => {
                tracing::warn!(
                    target: "webhook_verify",
                    job_id = %job_id,
                    "No signing secret on file, accepting unauthenticated event"
                );
                false
            }
        };

        let event: StatusChangeEvent = serde_json::from_value(raw)
            .map_err(|e| VerifyError::MalformedPayload(e.to_string()))?;

        handler
            .on_completion(&job, &event)
            .await
            .map_err(VerifyError::HandlerFailed)?;

        tracing::info!(
            target: "webhook_verify",
            job_id = %job_id,
            status = %event.status,
            authenticated,
            "Accepted terminal status change"
        );
        Ok(VerifyOutcome::Accepted { authenticated })
    }
}

fn required_str<'a>(raw: &'a serde_json::Value, field: &'static str) -> Result<&'a str, VerifyError> {
    raw.get(field)
        .and_then(|v| v.as_str())
        .ok_or(VerifyError::MissingField(field))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
