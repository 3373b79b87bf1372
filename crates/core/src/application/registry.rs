// Job Registry - in-memory table of generation jobs keyed by id

use crate::domain::{ExitReason, GenerationJob, GenerationRequest, JobId, JobState};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TimeProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Table plus the running count of non-terminal jobs, guarded together so
/// the capacity check and the insert are one atomic step.
#[derive(Default)]
struct Table {
    jobs: HashMap<JobId, GenerationJob>,
    active: usize,
}

/// Owns job creation, state transitions and eviction
pub struct JobRegistry {
    table: Mutex<Table>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    max_active_jobs: usize,
    retention_ms: i64,
}

impl JobRegistry {
    pub fn new(
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        max_active_jobs: usize,
        retention: Duration,
    ) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            id_provider,
            time_provider,
            max_active_jobs,
            retention_ms: retention.as_millis() as i64,
        }
    }

    /// Allocate a new `pending` job
    ///
    /// # Errors
    /// - AppError::CapacityExceeded when the active ceiling is reached
    pub async fn create(&self, request: GenerationRequest) -> Result<JobId> {
        let mut table = self.table.lock().await;

        if table.active >= self.max_active_jobs {
            return Err(AppError::CapacityExceeded {
                limit: self.max_active_jobs,
            });
        }

        let mut id = self.id_provider.generate_id();
        while table.jobs.contains_key(&id) {
            id = self.id_provider.generate_id();
        }

        let job = GenerationJob::new(id.clone(), self.time_provider.now_millis(), request);
        debug!(job_id = %id, action = %job.request.action, "Generation job registered");

        table.jobs.insert(id.clone(), job);
        table.active += 1;
        Ok(id)
    }

    /// Read-only lookup (returns a snapshot)
    pub async fn get(&self, id: &str) -> Result<GenerationJob> {
        self.table
            .lock()
            .await
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Generation job {} not found", id)))
    }

    /// Apply a state machine move
    ///
    /// Concurrent attempts on the same id are serialized by the table lock;
    /// the loser observes `InvalidStateTransition`.
    pub async fn transition(
        &self,
        id: &str,
        next: JobState,
        exit_reason: Option<ExitReason>,
    ) -> Result<GenerationJob> {
        let now = self.time_provider.now_millis();
        let mut table = self.table.lock().await;

        let job = table
            .jobs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Generation job {} not found", id)))?;

        let from = job.state;
        job.transition(next, exit_reason, now)?;
        let snapshot = job.clone();

        if next.is_terminal() {
            table.active = table.active.saturating_sub(1);
            info!(
                job_id = %id,
                from = %from,
                to = %next,
                exit_reason = ?snapshot.exit_reason,
                "Generation job finished"
            );
        } else {
            debug!(job_id = %id, from = %from, to = %next, "Generation job transitioned");
        }

        Ok(snapshot)
    }

    /// Delete terminal jobs whose `finished_at` is older than the retention window
    ///
    /// # Returns
    /// Number of jobs evicted
    pub async fn sweep_expired(&self, now_millis: i64) -> usize {
        let cutoff = now_millis - self.retention_ms;
        let mut table = self.table.lock().await;
        let before = table.jobs.len();

        table.jobs.retain(|_, job| match job.finished_at {
            Some(finished_at) if job.is_terminal() => finished_at > cutoff,
            _ => true,
        });

        before - table.jobs.len()
    }

    /// Number of non-terminal jobs
    pub async fn active_count(&self) -> usize {
        self.table.lock().await.active
    }

    /// Total number of retained jobs, terminal or not
    pub async fn len(&self) -> usize {
        self.table.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
