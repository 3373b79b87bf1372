//! Daemon configuration from `INKWELL_*` environment variables

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use inkwell_api_http::GatewayConfig;
use inkwell_core::OrchestratorConfig;
use inkwell_infra_system::CliCommandConfig;
use tracing::warn;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Daily rolling log files are written here when set
    pub dir: Option<PathBuf>,
}

impl LogConfig {
    /// Read before anything else so later config warnings are logged
    pub fn from_env() -> Self {
        Self::from_env_lookup(&Env {
            lookup: |key: &str| std::env::var(key).ok(),
        })
    }

    fn from_env_lookup<F>(env: &Env<F>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            format: match env.string("INKWELL_LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            dir: env
                .string("INKWELL_LOG_DIR")
                .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned())),
        }
    }
}

/// Everything the composition root needs
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub gateway: GatewayConfig,
    pub orchestrator: OrchestratorConfig,
    pub command: CliCommandConfig,
    pub log: LogConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        // The status override hook stays off outside test environments
        let mut gateway = GatewayConfig {
            allow_status_override: false,
            ..GatewayConfig::default()
        };
        if let Some(host) = env.string("INKWELL_HOST") {
            gateway.host = host;
        }
        env.parse_into("INKWELL_PORT", &mut gateway.port);
        env.parse_into("INKWELL_ALLOW_STATUS_OVERRIDE", &mut gateway.allow_status_override);

        let mut orchestrator = OrchestratorConfig::default();
        env.parse_into("INKWELL_MAX_ACTIVE_JOBS", &mut orchestrator.max_active_jobs);
        env.nonzero_secs_into("INKWELL_JOB_TIMEOUT_SECS", &mut orchestrator.job_timeout);
        env.secs_into("INKWELL_RETENTION_SECS", &mut orchestrator.retention);
        env.nonzero_secs_into("INKWELL_SWEEP_INTERVAL_SECS", &mut orchestrator.sweep_interval);
        env.parse_into("INKWELL_STREAM_BUFFER", &mut orchestrator.stream_buffer_capacity);
        env.parse_into("INKWELL_SUBSCRIBER_QUEUE", &mut orchestrator.subscriber_queue_depth);
        env.secs_into("INKWELL_STREAM_LINGER_SECS", &mut orchestrator.stream_linger);
        env.secs_into("INKWELL_AUTH_CACHE_TTL_SECS", &mut orchestrator.auth_cache_ttl);
        env.millis_into("INKWELL_KILL_GRACE_MS", &mut orchestrator.kill_grace);

        let mut command = CliCommandConfig::default();
        if let Some(program) = env.string("INKWELL_CLI_PROGRAM") {
            command.program = program;
        }
        if let Some(args) = env.list("INKWELL_CLI_ARGS") {
            command.args = args;
        }
        if let Some(args) = env.list("INKWELL_CLI_AUTH_ARGS") {
            command = command.with_auth_check_args(args);
        }
        if let Some(dir) = env.string("INKWELL_CLI_WORKDIR") {
            command = command.with_working_dir(&dir);
        }
        if let Some(extra) = env.list("INKWELL_CLI_ENV") {
            command.env_allowlist.extend(extra);
        }

        let log = LogConfig::from_env_lookup(&env);

        Self {
            gateway,
            orchestrator,
            command,
            log,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Whitespace-separated list
    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.string(key)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
    }

    fn parse_into<T: FromStr>(&self, key: &str, slot: &mut T) {
        if let Some(raw) = self.string(key) {
            match raw.parse() {
                Ok(value) => *slot = value,
                Err(_) => warn!(key = key, value = %raw, "Invalid value, keeping default"),
            }
        }
    }

    fn secs_into(&self, key: &str, slot: &mut Duration) {
        let mut secs = slot.as_secs();
        self.parse_into(key, &mut secs);
        *slot = Duration::from_secs(secs);
    }

    /// Like `secs_into`, but zero is rejected
    fn nonzero_secs_into(&self, key: &str, slot: &mut Duration) {
        if let Some(raw) = self.string(key) {
            match raw.parse::<NonZeroU64>() {
                Ok(secs) => *slot = Duration::from_secs(secs.get()),
                Err(_) => warn!(key = key, value = %raw, "Invalid value, keeping default"),
            }
        }
    }

    fn millis_into(&self, key: &str, slot: &mut Duration) {
        let mut millis = slot.as_millis() as u64;
        self.parse_into(key, &mut millis);
        *slot = Duration::from_millis(millis);
    }
}
