// Generation Service - use cases behind the request gateway

pub mod consistency;


pub use consistency::{ConsistencyCheckRequest, ConsistencyReport};

use crate::application::auth::{AuthOverride, AuthStatus, CachedAuthCheck, UNAUTHENTICATED_MESSAGE};
use crate::application::broker::{StreamBroker, Subscription};
use crate::application::reclamation::ReclamationScheduler;
use crate::application::registry::JobRegistry;
use crate::application::supervisor::ProcessSupervisor;
use crate::config::OrchestratorConfig;
use crate::domain::{GenerationJob, JobId};
use crate::error::{AppError, Result};
use crate::port::{AuthProbe, IdProvider, ProcessSpawner, RequestValidator, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// External collaborators the service is wired with
pub struct GenerationPorts {
    pub validator: Arc<dyn RequestValidator>,
    pub spawner: Arc<dyn ProcessSpawner>,
    pub auth_probe: Arc<dyn AuthProbe>,
    pub id_provider: Arc<dyn IdProvider>,
    pub time_provider: Arc<dyn TimeProvider>,
}

/// Generation Service
///
/// Owns the registry, broker, supervisor and auth cache; every gateway
/// route maps onto one method here.
pub struct GenerationService {
    registry: Arc<JobRegistry>,
    broker: Arc<StreamBroker>,
    supervisor: ProcessSupervisor,
    auth: CachedAuthCheck,
    validator: Arc<dyn RequestValidator>,
    time_provider: Arc<dyn TimeProvider>,
    sweep_interval: Duration,
}

impl GenerationService {
    pub fn new(config: &OrchestratorConfig, ports: GenerationPorts) -> Self {
        let registry = Arc::new(JobRegistry::new(
            ports.id_provider,
            ports.time_provider.clone(),
            config.max_active_jobs,
            config.retention,
        ));
        let broker = Arc::new(StreamBroker::new(
            ports.time_provider.clone(),
            config.stream_buffer_capacity,
            config.subscriber_queue_depth,
            config.stream_linger,
        ));
        let supervisor = ProcessSupervisor::new(
            registry.clone(),
            broker.clone(),
            ports.spawner,
            config.job_timeout,
            config.kill_grace,
        );
        let auth = CachedAuthCheck::new(
            ports.auth_probe,
            ports.time_provider.clone(),
            config.auth_cache_ttl,
        );

        Self {
            registry,
            broker,
            supervisor,
            auth,
            validator: ports.validator,
            time_provider: ports.time_provider,
            sweep_interval: config.sweep_interval,
        }
    }

    /// Validate, register and launch a generation job
    ///
    /// Returns as soon as the job is registered; output arrives on the stream.
    ///
    /// # Errors
    /// - AppError::InvalidRequest on a malformed body
    /// - AppError::Unauthorized when the external tool is not logged in
    /// - AppError::CapacityExceeded when too many jobs are active
    pub async fn generate(&self, raw: &serde_json::Value) -> Result<JobId> {
        let request = self.validator.validate(raw).into_result()?;

        if !self.auth.is_authenticated().await {
            warn!(action = %request.action, "Generation refused: tool not authenticated");
            return Err(AppError::Unauthorized(UNAUTHENTICATED_MESSAGE.to_string()));
        }

        let action = request.action.clone();
        let id = self.registry.create(request).await?;
        // Open before run so the earliest chunk is buffered for late subscribers
        self.broker.open(&id).await;
        self.supervisor.run(&id).await?;

        info!(job_id = %id, action = %action, "Generation job accepted");
        Ok(id)
    }

    /// Job snapshot
    pub async fn job(&self, id: &str) -> Result<GenerationJob> {
        self.registry.get(id).await
    }

    /// Attach to a job's output
    ///
    /// # Errors
    /// - AppError::NotFound for an unknown (or evicted) job
    pub async fn stream(&self, id: &str) -> Result<Subscription> {
        self.registry.get(id).await?;
        Ok(self.broker.subscribe(id).await)
    }

    /// Caller-initiated cancellation (idempotent)
    pub async fn cancel(&self, id: &str) -> Result<GenerationJob> {
        self.supervisor.cancel(id).await
    }

    /// Whether the external tool is usable
    pub async fn status(&self, force: Option<AuthOverride>) -> AuthStatus {
        self.auth.status(force).await
    }

    pub fn consistency_check(&self, req: &ConsistencyCheckRequest) -> ConsistencyReport {
        consistency::execute(req)
    }

    /// Background sweeper over this service's registry and broker
    pub fn reclamation_scheduler(&self) -> ReclamationScheduler {
        ReclamationScheduler::new(
            self.registry.clone(),
            self.broker.clone(),
            self.time_provider.clone(),
            self.sweep_interval,
        )
    }

    /// Stop every supervised process, waiting at most `wait`
    pub async fn shutdown(&self, wait: Duration) -> usize {
        self.supervisor.shutdown(wait).await
    }

    pub async fn active_jobs(&self) -> usize {
        self.registry.active_count().await
    }
}
