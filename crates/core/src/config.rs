// Orchestrator configuration (no magic values in services)

use std::time::Duration;

/// Default ceiling on concurrently non-terminal jobs
pub const DEFAULT_MAX_ACTIVE_JOBS: usize = 8;

/// Default wall-clock budget per generation process (2 minutes)
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(120);

/// Default retention of terminal jobs before eviction (5 minutes)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Default period of the reclamation sweep (30 seconds)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Default replay ring buffer size, in chunks
pub const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 256;

/// Default per-subscriber queue depth beyond the replay backlog
pub const DEFAULT_SUBSCRIBER_QUEUE_DEPTH: usize = 64;

/// Default time a closed stream channel stays available for late subscribers
pub const DEFAULT_STREAM_LINGER: Duration = Duration::from_secs(30);

/// Default TTL of the cached authentication check
pub const DEFAULT_AUTH_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default wait between SIGTERM and SIGKILL
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of non-terminal jobs (create fails beyond it)
    pub max_active_jobs: usize,

    /// Hard wall-clock timeout starting at spawn
    pub job_timeout: Duration,

    /// How long terminal jobs remain queryable
    pub retention: Duration,

    /// Period of the registry/broker sweep
    pub sweep_interval: Duration,

    /// Replay buffer capacity per stream channel (chunks)
    pub stream_buffer_capacity: usize,

    /// Extra live-chunk slack per subscriber before it is dropped
    pub subscriber_queue_depth: usize,

    /// Closed channels are discarded after this long
    pub stream_linger: Duration,

    /// Authentication check cache TTL
    pub auth_cache_ttl: Duration,

    /// Grace period between polite and forced termination
    pub kill_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_active_jobs: DEFAULT_MAX_ACTIVE_JOBS,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            retention: DEFAULT_RETENTION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stream_buffer_capacity: DEFAULT_STREAM_BUFFER_CAPACITY,
            subscriber_queue_depth: DEFAULT_SUBSCRIBER_QUEUE_DEPTH,
            stream_linger: DEFAULT_STREAM_LINGER,
            auth_cache_ttl: DEFAULT_AUTH_CACHE_TTL,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}
