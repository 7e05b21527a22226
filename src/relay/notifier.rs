use crate::errors::RegistryError;

use super::delivery::DeliveryEngine;
use super::models::{
    AgentReport, AgentStatus, CompletionEvent, CompletionKind, JobRecord, StatusChangeEvent,
};
use super::registry::JobRegistry;

/// What happened to a completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Callback accepted the event.
    Delivered,
    /// All delivery attempts failed or the receiver rejected the event.
    Failed,
    /// No registration exists for the reported job id.
    UnknownJob,
    /// Non-terminal status; nothing to send.
    Ignored,
}

/// Turns terminal status changes into completion events on registered
/// callbacks. Best-effort: failures are logged, never queued or raised.
#[derive(Clone)]
pub struct CompletionNotifier {
    registry: JobRegistry,
    delivery: DeliveryEngine,
}

impl CompletionNotifier {
    pub fn new(registry: JobRegistry, delivery: DeliveryEngine) -> Self {
        Self { registry, delivery }
    }

    /// Notify the callback registered for `change.id`, looking the job up
    /// first. Non-terminal statuses and unknown jobs are dropped.
    pub async fn notify(&self, change: &StatusChangeEvent) -> NotifyOutcome {
        if !change.status.is_terminal() {
            tracing::debug!(
                target: "webhook_delivery",
                job_id = %change.id,
                status = %change.status,
                "Ignoring non-terminal status change"
            );
            return NotifyOutcome::Ignored;
        }

        let job = match self.registry.lookup(&change.id).await {
            Ok(job) => job,
            Err(RegistryError::JobNotFound { .. }) => {
                tracing::error!(
                    target: "webhook_delivery",
                    job_id = %change.id,
                    status = %change.status,
                    "No registration found for completed job, dropping notification"
                );
                return NotifyOutcome::UnknownJob;
            }
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    job_id = %change.id,
                    error = %e,
                    "Failed to look up job registration"
                );
                return NotifyOutcome::Failed;
            }
        };

        self.notify_job(&job, change).await
    }

    /// Notify with an already-resolved registration. Used when the caller
    /// has just looked the job up itself (the inbound verification path).
    pub async fn notify_job(&self, job: &JobRecord, change: &StatusChangeEvent) -> NotifyOutcome {
        let event = match build_completion_event(job, change) {
            Some(event) => event,
            None => return NotifyOutcome::Ignored,
        };

        let body = match serde_json::to_vec(&event) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    job_id = %job.job_id,
                    error = %e,
                    "Failed to serialize completion event"
                );
                return NotifyOutcome::Failed;
            }
        };

        let delivered = self
            .delivery
            .deliver(&job.callback_url, &body, job.signing_secret.as_deref())
            .await;

        if delivered {
            NotifyOutcome::Delivered
        } else {
            tracing::error!(
                target: "webhook_delivery",
                job_id = %job.job_id,
                event = %event.event,
                url = %job.callback_url,
                "Completion notification was not delivered"
            );
            NotifyOutcome::Failed
        }
    }
}

/// Map a terminal status change onto the outbound completion event.
/// Returns `None` for non-terminal statuses.
///
/// The registry stores no display name for jobs, so `agent.name` repeats the
/// job id. `agent.error` is populated from the summary only on failures.
pub fn build_completion_event(
    job: &JobRecord,
    change: &StatusChangeEvent,
) -> Option<CompletionEvent> {
    let kind = CompletionKind::from_status(change.status)?;
    Some(CompletionEvent {
        event: kind,
        agent: AgentReport {
            id: change.id.clone(),
            name: change.id.clone(),
            status: change.status,
            summary: change.summary.clone(),
            created_at: job.created_at.clone(),
            finished_at: change.timestamp.clone(),
            pr_url: change.target.as_ref().and_then(|t| t.pr_url.clone()),
            error: match change.status {
                AgentStatus::Error => change.summary.clone(),
                _ => None,
            },
        },
        metadata: job.metadata.clone(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::db::{DbHandle, RegistryDb};
    use super::super::models::{ChangeTarget, STATUS_CHANGE_EVENT};
    use super::super::signature;
    use super::*;

    use std::time::Duration;

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_registry() -> JobRegistry {
        JobRegistry::new(DbHandle::new(RegistryDb::new_in_memory().unwrap()))
    }

    fn test_notifier(registry: JobRegistry) -> CompletionNotifier {
        // Single attempt so failure tests never sit in backoff sleeps.
        let delivery = DeliveryEngine::new(Duration::from_secs(5))
            .unwrap()
            .with_max_attempts(1);
        CompletionNotifier::new(registry, delivery)
    }

    fn change(id: &str, status: AgentStatus) -> StatusChangeEvent {
        StatusChangeEvent {
            event: STATUS_CHANGE_EVENT.to_string(),
            timestamp: "2025-01-01T00:10:00Z".to_string(),
            id: id.to_string(),
            status,
            source: None,
            target: Some(ChangeTarget {
                url: "https://github.com/o/r".to_string(),
                branch_name: "agent/fix".to_string(),
                pr_url: Some("https://github.com/o/r/pull/7".to_string()),
            }),
            summary: Some("All tests passing".to_string()),
        }
    }

    fn job(id: &str, url: &str) -> JobRecord {
        JobRecord {
            job_id: id.to_string(),
            callback_url: url.to_string(),
            signing_secret: Some("aa".repeat(32)),
            metadata: serde_json::json!({"emailSubject": "done"}),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_build_event_for_finished_status() {
        let job = job("bc-1", "https://example.com/hook");
        let event = build_completion_event(&job, &change("bc-1", AgentStatus::Finished)).unwrap();

        assert_eq!(event.event, CompletionKind::Completed);
        assert_eq!(event.agent.id, "bc-1");
        assert_eq!(event.agent.status, AgentStatus::Finished);
        assert_eq!(event.agent.created_at, "2025-01-01T00:00:00Z");
        assert_eq!(event.agent.finished_at, "2025-01-01T00:10:00Z");
        assert_eq!(
            event.agent.pr_url.as_deref(),
            Some("https://github.com/o/r/pull/7")
        );
        assert!(event.agent.error.is_none());
        assert_eq!(event.metadata["emailSubject"], "done");
    }

    #[test]
    fn test_build_event_for_error_status_carries_error() {
        let job = job("bc-1", "https://example.com/hook");
        let event = build_completion_event(&job, &change("bc-1", AgentStatus::Error)).unwrap();

        assert_eq!(event.event, CompletionKind::Failed);
        assert_eq!(event.agent.error.as_deref(), Some("All tests passing"));
    }

    #[test]
    fn test_build_event_non_terminal_is_none() {
        let job = job("bc-1", "https://example.com/hook");
        assert!(build_completion_event(&job, &change("bc-1", AgentStatus::Running)).is_none());
        assert!(build_completion_event(&job, &change("bc-1", AgentStatus::Expired)).is_none());
    }

    #[tokio::test]
    async fn test_notify_delivers_signed_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let registry = test_registry();
        let record = registry
            .register("bc-1", &server.uri(), serde_json::json!({"k": "v"}))
            .await
            .unwrap();
        let notifier = test_notifier(registry);

        let outcome = notifier.notify(&change("bc-1", AgentStatus::Finished)).await;
        assert_eq!(outcome, NotifyOutcome::Delivered);

        let requests = server.received_requests().await.unwrap();
        let request = &requests[0];
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["event"], "agent.completed");
        assert_eq!(body["agent"]["id"], "bc-1");
        assert_eq!(body["metadata"]["k"], "v");

        // The receiver can verify the signature with the secret it was
        // handed at registration time.
        let sent_sig = request.headers.get("X-Signature").unwrap();
        assert!(signature::verify(
            record.signing_secret.as_deref().unwrap(),
            &request.body,
            sent_sig.to_str().unwrap()
        ));
    }

    #[tokio::test]
    async fn test_notify_error_status_sends_agent_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let registry = test_registry();
        registry
            .register("bc-2", &server.uri(), serde_json::json!({}))
            .await
            .unwrap();
        let notifier = test_notifier(registry);

        let outcome = notifier.notify(&change("bc-2", AgentStatus::Error)).await;
        assert_eq!(outcome, NotifyOutcome::Delivered);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["event"], "agent.failed");
        assert_eq!(body["agent"]["error"], "All tests passing");
    }

    #[tokio::test]
    async fn test_notify_unknown_job_is_dropped() {
        let notifier = test_notifier(test_registry());
        let outcome = notifier
            .notify(&change("never-registered", AgentStatus::Finished))
            .await;
        assert_eq!(outcome, NotifyOutcome::UnknownJob);
    }

    #[tokio::test]
    async fn test_notify_non_terminal_is_ignored_without_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let registry = test_registry();
        registry
            .register("bc-3", &server.uri(), serde_json::json!({}))
            .await
            .unwrap();
        let notifier = test_notifier(registry);

        let outcome = notifier.notify(&change("bc-3", AgentStatus::Running)).await;
        assert_eq!(outcome, NotifyOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_notify_reports_failed_when_receiver_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let registry = test_registry();
        registry
            .register("bc-4", &server.uri(), serde_json::json!({}))
            .await
            .unwrap();
        let notifier = test_notifier(registry);

        let outcome = notifier.notify(&change("bc-4", AgentStatus::Finished)).await;
        assert_eq!(outcome, NotifyOutcome::Failed);
    }
}
