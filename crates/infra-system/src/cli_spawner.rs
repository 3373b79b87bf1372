// CLI process spawner
// One child per generation job: request JSON on stdin, text on stdout
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use inkwell_core::domain::GenerationJob;
use inkwell_core::port::{ExecutionError, GenerationProcess, ProcessExit, ProcessSpawner};

use crate::command_config::CliCommandConfig;
use crate::utf8_chunker::Utf8Chunker;

/// Bytes requested per stdout read
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Upper bound on retained stderr (diagnostics only)
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// How long to wait for the stderr reader once the child has exited
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Spawns the configured generation CLI
pub struct CliProcessSpawner {
    config: CliCommandConfig,
}

impl CliProcessSpawner {
    /// # Example
    /// ```ignore
    /// let spawner = CliProcessSpawner::new(CliCommandConfig::new("claude", vec!["--print".into()]));
    /// ```
    pub fn new(config: CliCommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProcessSpawner for CliProcessSpawner {
    async fn spawn(
        &self,
        job: &GenerationJob,
    ) -> Result<Box<dyn GenerationProcess>, ExecutionError> {
        let input = serde_json::to_vec(&job.request)
            .map_err(|e| ExecutionError::InvalidPayload(e.to_string()))?;

        let mut cmd = self.config.command(&self.config.args);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so termination reaches grandchildren too
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ExecutionError::SpawnFailed(format!("{}: {}", self.config.program, e))
        })?;

        let pid = child.id();
        info!(
            job_id = %job.id,
            program = %self.config.program,
            pid = ?pid,
            "Spawned generation CLI"
        );

        if let Some(mut stdin) = child.stdin.take() {
            let job_id = job.id.clone();
            tokio::spawn(async move {
                // A tool that ignores stdin closes the pipe early; not an error
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(job_id = %job_id, error = %e, "Could not write request to stdin");
                }
                let _ = stdin.shutdown().await;
            });
        }

        let stderr = child.stderr.take().map(|stderr| tokio::spawn(capture_bounded(stderr)));

        Ok(Box::new(CliProcess {
            stdout: child.stdout.take(),
            child,
            pid,
            stderr,
            chunker: Utf8Chunker::default(),
            buf: vec![0; READ_BUFFER_SIZE],
        }))
    }
}

/// A running generation CLI
pub struct CliProcess {
    child: Child,
    pid: Option<u32>,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    chunker: Utf8Chunker,
    buf: Vec<u8>,
}

impl CliProcess {
    async fn collect_stderr(&mut self) -> String {
        match self.stderr.take() {
            Some(handle) => match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, handle).await {
                Ok(Ok(text)) => text,
                _ => String::new(),
            },
            None => String::new(),
        }
    }

    /// Send SIGTERM to the process group, SIGKILL it after `grace`
    #[cfg(unix)]
    async fn kill_graceful(&mut self, pid: u32, grace: Duration) -> Result<(), ExecutionError> {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let group = Pid::from_raw(pid as i32);

        info!(pid = %pid, "Sending SIGTERM for graceful shutdown");
        if let Err(e) = killpg(group, Signal::SIGTERM) {
            warn!(pid = %pid, error = %e, "SIGTERM failed");
        } else if tokio::time::timeout(grace, self.child.wait()).await.is_ok() {
            info!(pid = %pid, "Process exited gracefully after SIGTERM");
            // Stragglers left in the group still hold the pipes open
            let _ = killpg(group, Signal::SIGKILL);
            return Ok(());
        }

        warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
        let _ = killpg(group, Signal::SIGKILL);
        self.child
            .kill()
            .await
            .map_err(|e| ExecutionError::Killed(format!("SIGKILL failed: {}", e)))
    }
}

#[async_trait]
impl GenerationProcess for CliProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn next_chunk(&mut self) -> Result<Option<String>, ExecutionError> {
        loop {
            let Some(stdout) = self.stdout.as_mut() else {
                return Ok(None);
            };
            // `read` is cancel-safe; decoder state lives on self
            let n = stdout
                .read(&mut self.buf)
                .await
                .map_err(|e| ExecutionError::Io(e.to_string()))?;

            if n == 0 {
                self.stdout = None;
                return Ok(self.chunker.finish());
            }
            if let Some(text) = self.chunker.push(&self.buf[..n]) {
                return Ok(Some(text));
            }
        }
    }

    async fn wait(&mut self) -> Result<ProcessExit, ExecutionError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ExecutionError::Io(e.to_string()))?;
        let stderr = self.collect_stderr().await;

        debug!(pid = ?self.pid, exit_code = ?status.code(), "Generation CLI exited");
        Ok(ProcessExit {
            success: status.success(),
            code: status.code(),
            stderr,
        })
    }

    async fn terminate(&mut self, grace: Duration) -> Result<(), ExecutionError> {
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                return self.kill_graceful(pid, grace).await;
            }
        }

        let _ = grace;
        self.child
            .kill()
            .await
            .map_err(|e| ExecutionError::Killed(e.to_string()))
    }
}

/// Read a stream to the end, keeping at most MAX_STDERR_BYTES
async fn capture_bounded<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut kept = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_STDERR_BYTES.saturating_sub(kept.len());
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}
