use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status values reported by the external agent system.
///
/// Only `Finished` and `Error` are terminal; everything else is acknowledged
/// and ignored by the notification path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Finished,
    Error,
    Running,
    Creating,
    Expired,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
            Self::Running => "RUNNING",
            Self::Creating => "CREATING",
            Self::Expired => "EXPIRED",
        }
    }

    /// True for the two statuses that trigger a completion notification.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FINISHED" => Ok(Self::Finished),
            "ERROR" => Ok(Self::Error),
            "RUNNING" => Ok(Self::Running),
            "CREATING" => Ok(Self::Creating),
            "EXPIRED" => Ok(Self::Expired),
            _ => Err(format!("Invalid agent status: {}", s)),
        }
    }
}

/// Outbound event kinds, one per terminal agent status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionKind {
    #[serde(rename = "agent.completed")]
    Completed,
    #[serde(rename = "agent.failed")]
    Failed,
}

impl CompletionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "agent.completed",
            Self::Failed => "agent.failed",
        }
    }

    /// Map a terminal status to its event kind. `None` for non-terminal
    /// statuses, which never produce an outbound event.
    pub fn from_status(status: AgentStatus) -> Option<Self> {
        match status {
            AgentStatus::Finished => Some(Self::Completed),
            AgentStatus::Error => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered job: the durable mapping from an external job id to the
/// callback destination, signing secret, and caller-supplied metadata.
///
/// Records are write-once. `signing_secret` is `None` only on rows created
/// before secrets were introduced; such jobs are delivered unsigned and
/// accepted permissively on the inbound side (unless strict mode is on).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub callback_url: String,
    pub signing_secret: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

// ── Outbound wire types ───────────────────────────────────────────────

/// The completion event POSTed to a job's callback URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub event: CompletionKind,
    pub agent: AgentReport,
    pub metadata: serde_json::Value,
}

/// Agent details inside a [`CompletionEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReport {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: String,
    pub finished_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Inbound wire types ────────────────────────────────────────────────

/// Event name the external system sends on every status webhook.
pub const STATUS_CHANGE_EVENT: &str = "statusChange";

/// A `statusChange` webhook body from the external agent system.
///
/// The verifier validates field presence and recognized values against the
/// raw JSON before deserializing into this type, so handlers can rely on
/// `event`, `id`, `status`, and `timestamp` being present and recognized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeEvent {
    pub event: String,
    pub timestamp: String,
    pub id: String,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ChangeSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ChangeTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Repository the agent ran against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSource {
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// Where the agent pushed its work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTarget {
    pub url: String,
    pub branch_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
}
