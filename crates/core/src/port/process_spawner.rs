// Process Spawner Port
// Abstraction over the external generation tool launched once per job

use crate::domain::GenerationJob;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Observed process termination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit signalled success (zero status)
    pub success: bool,
    pub code: Option<i32>,
    /// Captured standard error, for diagnostics only
    pub stderr: String,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process killed: {0}")]
    Killed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// A live child process producing generation output
///
/// `next_chunk` must be cancel-safe: the supervisor races it against
/// cancellation and timeout.
#[async_trait]
pub trait GenerationProcess: Send {
    /// OS process id, if the implementation has one
    fn pid(&self) -> Option<u32>;

    /// Next opaque chunk of standard output; `Ok(None)` once stdout closes
    async fn next_chunk(&mut self) -> Result<Option<String>, ExecutionError>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessExit, ExecutionError>;

    /// Ask the process to stop, forcing it after `grace`, and reap it
    async fn terminate(&mut self, grace: Duration) -> Result<(), ExecutionError>;
}

/// Launches one external process per generation job
///
/// Implementations:
/// - CliProcessSpawner: spawns the configured CLI (infra-system)
/// - ScriptedSpawner: replays a canned script (tests)
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Spawn a process fed with the job's serialized request
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    /// - ExecutionError::InvalidPayload if the request cannot be serialized
    async fn spawn(&self, job: &GenerationJob)
        -> Result<Box<dyn GenerationProcess>, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// What every spawned scripted process does
    #[derive(Debug, Clone)]
    pub struct Script {
        pub chunks: Vec<String>,
        /// Pause before each chunk
        pub chunk_delay: Duration,
        pub exit_code: i32,
        /// Never exit on its own after the chunks run out
        pub hang: bool,
        /// Refuse to spawn with this message
        pub spawn_error: Option<String>,
        pub stderr: String,
        /// Exit only once notified (after the chunks run out)
        pub exit_signal: Option<Arc<Notify>>,
    }

    impl Script {
        pub fn chunks<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                chunks: chunks.into_iter().map(Into::into).collect(),
                chunk_delay: Duration::ZERO,
                exit_code: 0,
                hang: false,
                spawn_error: None,
                stderr: String::new(),
                exit_signal: None,
            }
        }

        pub fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::chunks(Vec::<String>::new())
            }
        }

        pub fn spawn_failure(message: impl Into<String>) -> Self {
            Self {
                spawn_error: Some(message.into()),
                ..Self::chunks(Vec::<String>::new())
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.chunk_delay = delay;
            self
        }

        pub fn with_exit_code(mut self, code: i32) -> Self {
            self.exit_code = code;
            self
        }

        pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
            self.stderr = stderr.into();
            self
        }

        pub fn then_hang(mut self) -> Self {
            self.hang = true;
            self
        }

        pub fn exit_on(mut self, signal: Arc<Notify>) -> Self {
            self.exit_signal = Some(signal);
            self
        }
    }

    /// Counters shared between a spawner and its processes
    #[derive(Debug, Default)]
    pub struct ScriptStats {
        pub spawned: AtomicUsize,
        pub terminated: AtomicUsize,
    }

    /// Spawner that replays a [`Script`] instead of launching anything
    pub struct ScriptedSpawner {
        script: Script,
        stats: Arc<ScriptStats>,
    }

    impl ScriptedSpawner {
        pub fn new(script: Script) -> Self {
            Self {
                script,
                stats: Arc::new(ScriptStats::default()),
            }
        }

        pub fn spawn_count(&self) -> usize {
            self.stats.spawned.load(Ordering::SeqCst)
        }

        pub fn terminate_count(&self) -> usize {
            self.stats.terminated.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProcessSpawner for ScriptedSpawner {
        async fn spawn(
            &self,
            _job: &GenerationJob,
        ) -> Result<Box<dyn GenerationProcess>, ExecutionError> {
            let script = self.script.clone();
            if let Some(msg) = script.spawn_error {
                return Err(ExecutionError::SpawnFailed(msg));
            }
            self.stats.spawned.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedProcess {
                pending: script.chunks.clone().into(),
                script,
                terminated: false,
                stats: Arc::clone(&self.stats),
            }))
        }
    }

    /// Process half of [`ScriptedSpawner`]
    pub struct ScriptedProcess {
        script: Script,
        pending: VecDeque<String>,
        terminated: bool,
        stats: Arc<ScriptStats>,
    }

    #[async_trait]
    impl GenerationProcess for ScriptedProcess {
        fn pid(&self) -> Option<u32> {
            None
        }

        async fn next_chunk(&mut self) -> Result<Option<String>, ExecutionError> {
            if self.terminated {
                return Ok(None);
            }
            if self.pending.is_empty() {
                if self.script.hang {
                    std::future::pending::<()>().await;
                }
                return Ok(None);
            }
            if !self.script.chunk_delay.is_zero() {
                tokio::time::sleep(self.script.chunk_delay).await;
            }
            Ok(self.pending.pop_front())
        }

        async fn wait(&mut self) -> Result<ProcessExit, ExecutionError> {
            if self.script.hang && !self.terminated {
                std::future::pending::<()>().await;
            }
            if let (Some(signal), false) = (&self.script.exit_signal, self.terminated) {
                signal.notified().await;
            }
            Ok(ProcessExit {
                success: self.script.exit_code == 0 && !self.terminated,
                code: (!self.terminated).then_some(self.script.exit_code),
                stderr: self.script.stderr.clone(),
            })
        }

        async fn terminate(&mut self, _grace: Duration) -> Result<(), ExecutionError> {
            if !self.terminated {
                self.terminated = true;
                self.stats.terminated.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }
}
