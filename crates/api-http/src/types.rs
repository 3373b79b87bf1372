//! HTTP Request/Response Types

use inkwell_core::domain::{ExitReason, GenerationJob, JobState};
use serde::{Deserialize, Serialize};

/// POST generate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub id: String,
}

/// GET status
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub force: Option<String>,
}

/// GET generations/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub state: JobState,
    pub action: String,
    pub agent_target: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub exit_reason: Option<ExitReason>,
}

impl From<GenerationJob> for JobView {
    fn from(job: GenerationJob) -> Self {
        Self {
            id: job.id,
            state: job.state,
            action: job.request.action,
            agent_target: job.request.agent_target,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            exit_reason: job.exit_reason,
        }
    }
}

/// POST generations/{id}/cancel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub id: String,
    pub state: JobState,
}

/// GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
