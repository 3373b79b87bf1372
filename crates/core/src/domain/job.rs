// Generation Job Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Opaque generation job identifier (UUID v4 in production)
pub type JobId = String;

/// Job State
///
/// `pending -> running -> streaming -> {completed | failed}` plus
/// `pending|running|streaming -> {cancelled | failed}` on cancellation or timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Terminal states never transition again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    /// Legality check for a single move in the state machine
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Pending, Running) => true,
            (Running, Streaming) => true,
            (Streaming, Completed) => true,
            // A process may exit cleanly without printing anything
            (Running, Completed) => true,
            (Pending | Running | Streaming, Failed) => true,
            (Pending | Running | Streaming, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Streaming => write!(f, "streaming"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
            JobState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a job reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    Normal,
    Timeout,
    Cancelled,
    ProcessError,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "normal"),
            ExitReason::Timeout => write!(f, "timeout"),
            ExitReason::Cancelled => write!(f, "cancelled"),
            ExitReason::ProcessError => write!(f, "process-error"),
        }
    }
}

/// Validated generation request (agent target, action, context, payload)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_target: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            agent_target: None,
            action: action.into(),
            context: None,
            payload: None,
        }
    }

    pub fn with_agent_target(mut self, agent_target: impl Into<String>) -> Self {
        self.agent_target = Some(agent_target.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Generation Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: JobId,
    pub state: JobState,
    pub request: GenerationRequest,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    /// Populated only in terminal states
    pub exit_reason: Option<ExitReason>,
}

impl GenerationJob {
    /// Create a new pending job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `request` - Validated request, immutable from here on
    pub fn new(id: impl Into<String>, created_at: i64, request: GenerationRequest) -> Self {
        Self {
            id: id.into(),
            state: JobState::Pending,
            request,
            created_at,
            started_at: None,
            finished_at: None,
            exit_reason: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a state machine move with explicit timestamp
    ///
    /// Terminal moves require an exit reason; non-terminal moves ignore it.
    pub fn transition(
        &mut self,
        next: JobState,
        exit_reason: Option<ExitReason>,
        now_millis: i64,
    ) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }

        if next == JobState::Running {
            self.started_at = Some(now_millis);
        }

        if next.is_terminal() {
            self.exit_reason = Some(exit_reason.unwrap_or(match next {
                JobState::Completed => ExitReason::Normal,
                JobState::Cancelled => ExitReason::Cancelled,
                _ => ExitReason::ProcessError,
            }));
            self.finished_at = Some(now_millis);
        }

        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> GenerationJob {
        GenerationJob::new("g1", 1_000, GenerationRequest::new("generate-chapter"))
    }

    #[test]
    fn test_happy_path_records_timestamps() {
        let mut job = job();
        job.transition(JobState::Running, None, 1_100).unwrap();
        job.transition(JobState::Streaming, None, 1_200).unwrap();
        job.transition(JobState::Completed, Some(ExitReason::Normal), 1_300)
            .unwrap();

        assert_eq!(job.started_at, Some(1_100));
        assert_eq!(job.finished_at, Some(1_300));
        assert_eq!(job.exit_reason, Some(ExitReason::Normal));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job();
        job.transition(JobState::Cancelled, None, 1_100).unwrap();

        let err = job
            .transition(JobState::Running, None, 1_200)
            .unwrap_err();
        assert!(err.to_string().contains("cancelled -> running"));
        assert_eq!(job.state, JobState::Cancelled);
        assert_eq!(job.exit_reason, Some(ExitReason::Cancelled));
    }

    #[test]
    fn test_cannot_skip_running() {
        let mut job = job();
        assert!(job.transition(JobState::Streaming, None, 1_100).is_err());
        assert!(job.transition(JobState::Completed, None, 1_100).is_err());
        assert_eq!(job.state, JobState::Pending);
    }

    #[test]
    fn test_timeout_is_failed_with_reason() {
        let mut job = job();
        job.transition(JobState::Running, None, 1_100).unwrap();
        job.transition(JobState::Failed, Some(ExitReason::Timeout), 5_000)
            .unwrap();
        assert_eq!(job.exit_reason, Some(ExitReason::Timeout));
    }

    #[test]
    fn test_request_wire_shape_is_camel_case() {
        let req = GenerationRequest::new("suggest-titles")
            .with_agent_target("writer")
            .with_context(serde_json::json!({"projectId": "p1"}));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["agentTarget"], "writer");
        assert_eq!(value["context"]["projectId"], "p1");
        assert!(value.get("payload").is_none());
    }
}
