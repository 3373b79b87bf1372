// CLI authentication probe
// Runs the tool's check command; exit status 0 means logged in and usable
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

use inkwell_core::port::AuthProbe;

use crate::command_config::CliCommandConfig;

/// Default budget for one probe invocation
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CliAuthProbe {
    config: CliCommandConfig,
    timeout: Duration,
}

impl CliAuthProbe {
    pub fn new(config: CliCommandConfig) -> Self {
        Self {
            config,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AuthProbe for CliAuthProbe {
    async fn is_authenticated(&self) -> bool {
        let mut cmd = self.config.command(&self.config.auth_check_args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.config.program, error = %e, "Authentication probe could not start");
                return false;
            }
        };

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(program = %self.config.program, exit_code = ?status.code(), "Authentication probe finished");
                status.success()
            }
            Ok(Err(e)) => {
                warn!(program = %self.config.program, error = %e, "Authentication probe failed");
                false
            }
            Err(_) => {
                warn!(
                    program = %self.config.program,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Authentication probe timed out"
                );
                // kill_on_drop reaps the child
                false
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn probe(script: &str) -> CliAuthProbe {
        CliAuthProbe::new(
            CliCommandConfig::new("sh", vec![])
                .with_auth_check_args(vec!["-c".to_string(), script.to_string()]),
        )
    }

    #[tokio::test]
    async fn test_zero_exit_is_authenticated() {
        assert!(probe("exit 0").is_authenticated().await);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_unauthenticated() {
        assert!(!probe("echo 'not logged in' >&2; exit 1").is_authenticated().await);
    }

    #[tokio::test]
    async fn test_missing_program_is_unauthenticated() {
        let probe = CliAuthProbe::new(CliCommandConfig::new("/nonexistent/tool", vec![]));
        assert!(!probe.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_hanging_probe_times_out() {
        let probe = probe("sleep 10").with_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        assert!(!probe.is_authenticated().await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
