// Process Supervisor - one external process per job, driven by its own task

use crate::application::broker::StreamBroker;
use crate::application::registry::JobRegistry;
use crate::domain::{ExitReason, GenerationJob, JobId, JobState};
use crate::error::{AppError, Result};
use crate::port::{ExecutionError, GenerationProcess, ProcessExit, ProcessSpawner};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Why the supervisor was asked to stop a process
///
/// Tagged before the process is signalled so the exit handler can tell
/// "we killed it" from "it crashed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopIntent {
    /// Caller-initiated cancellation
    Cancelled,
    /// Daemon shutdown
    Shutdown,
}

/// How one supervised run ended
#[derive(Debug)]
enum RunOutcome {
    Exited(ProcessExit),
    Failed(ExecutionError),
    TimedOut,
    Stopped(StopIntent),
}

impl RunOutcome {
    fn terminal(&self) -> (JobState, ExitReason) {
        match self {
            RunOutcome::Exited(exit) if exit.success => (JobState::Completed, ExitReason::Normal),
            RunOutcome::Exited(_) | RunOutcome::Failed(_) => {
                (JobState::Failed, ExitReason::ProcessError)
            }
            RunOutcome::TimedOut => (JobState::Failed, ExitReason::Timeout),
            RunOutcome::Stopped(_) => (JobState::Cancelled, ExitReason::Cancelled),
        }
    }
}

/// Book-keeping for a live child process
struct LiveProcess {
    stop: watch::Sender<Option<StopIntent>>,
    handle: Option<JoinHandle<()>>,
}

type LiveTable = Arc<Mutex<HashMap<JobId, LiveProcess>>>;

/// Shared state handed to every supervision task
struct Shared {
    registry: Arc<JobRegistry>,
    broker: Arc<StreamBroker>,
    live: LiveTable,
    kill_grace: Duration,
}

/// Spawns, watches, times out and cancels generation processes
pub struct ProcessSupervisor {
    shared: Arc<Shared>,
    spawner: Arc<dyn ProcessSpawner>,
    timeout: Duration,
}

impl ProcessSupervisor {
    /// # Arguments
    /// * `timeout` - Hard wall-clock budget, starting at spawn
    /// * `kill_grace` - Wait between polite and forced termination
    pub fn new(
        registry: Arc<JobRegistry>,
        broker: Arc<StreamBroker>,
        spawner: Arc<dyn ProcessSpawner>,
        timeout: Duration,
        kill_grace: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                broker,
                live: Arc::new(Mutex::new(HashMap::new())),
                kill_grace,
            }),
            spawner,
            timeout,
        }
    }

    /// Spawn the external process for a pending job and return immediately
    ///
    /// Launch failures are recorded as `failed`/`process-error` on the job
    /// rather than returned.
    ///
    /// # Errors
    /// - AppError::NotFound for an unknown id
    /// - AppError::AlreadyRunning if a process is live for this id or the job left `pending`
    pub async fn run(&self, job_id: &str) -> Result<()> {
        let job = self.shared.registry.get(job_id).await?;
        let mut stop_rx = {
            let mut live = self.shared.live.lock().await;
            if live.contains_key(job_id) || job.state != JobState::Pending {
                return Err(AppError::AlreadyRunning(format!(
                    "Generation job {} already has a process ({})",
                    job_id, job.state
                )));
            }
            let (stop, stop_rx) = watch::channel(None);
            live.insert(job_id.to_string(), LiveProcess { stop, handle: None });
            stop_rx
        };

        let mut process = match self.spawner.spawn(&job).await {
            Ok(process) => process,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to launch generation process");
                self.shared
                    .finish(job_id, RunOutcome::Failed(e), None)
                    .await;
                return Ok(());
            }
        };
        let deadline = Instant::now() + self.timeout;

        if let Err(e) = self
            .shared
            .registry
            .transition(job_id, JobState::Running, None)
            .await
        {
            // Cancelled while the process was starting
            debug!(job_id = %job_id, error = %e, "Job left pending during spawn");
            let intent = (*stop_rx.borrow_and_update()).unwrap_or(StopIntent::Cancelled);
            self.shared
                .finish(job_id, RunOutcome::Stopped(intent), Some(&mut process))
                .await;
            return Ok(());
        }

        info!(
            job_id = %job_id,
            pid = ?process.pid(),
            action = %job.request.action,
            timeout_ms = self.timeout.as_millis() as u64,
            "Generation process started"
        );

        let shared = Arc::clone(&self.shared);
        let id = job_id.to_string();
        let handle = tokio::spawn(async move {
            let outcome = shared.drive(&id, process.as_mut(), &mut stop_rx, deadline).await;
            shared.finish(&id, outcome, Some(&mut process)).await;
        });

        if let Some(entry) = self.shared.live.lock().await.get_mut(job_id) {
            entry.handle = Some(handle);
        }
        Ok(())
    }

    /// Cancel a job on behalf of the caller
    ///
    /// The registry flips to `cancelled` and the stream closes synchronously;
    /// the process is then signalled and its exit is discarded. Cancelling a
    /// terminal job is a no-op that returns its current snapshot.
    pub async fn cancel(&self, job_id: &str) -> Result<GenerationJob> {
        let job = self.shared.registry.get(job_id).await?;
        if job.is_terminal() {
            return Ok(job);
        }

        // Tag and flip under the live table lock; `finish` resolves its
        // outcome under the same lock, so a tagged cancel is never lost
        let cancelled = {
            let live = self.shared.live.lock().await;
            if let Some(entry) = live.get(job_id) {
                entry.stop.send_replace(Some(StopIntent::Cancelled));
            }
            self.shared
                .registry
                .transition(job_id, JobState::Cancelled, Some(ExitReason::Cancelled))
                .await
        };

        match cancelled {
            Ok(job) => {
                self.shared.broker.close(job_id).await;
                info!(job_id = %job_id, "Generation job cancelled by caller");
                Ok(job)
            }
            // The process had already finished
            Err(AppError::Domain(_)) => self.shared.registry.get(job_id).await,
            Err(e) => Err(e),
        }
    }

    /// Whether a child process is currently supervised for this id
    pub async fn is_live(&self, job_id: &str) -> bool {
        self.shared.live.lock().await.contains_key(job_id)
    }

    pub async fn live_count(&self) -> usize {
        self.shared.live.lock().await.len()
    }

    /// Stop every supervised process and wait (bounded) for their tasks
    ///
    /// # Returns
    /// Number of processes that were signalled
    pub async fn shutdown(&self, wait: Duration) -> usize {
        let handles: Vec<JoinHandle<()>> = {
            let mut live = self.shared.live.lock().await;
            live.values_mut()
                .filter_map(|entry| {
                    entry.stop.send_replace(Some(StopIntent::Shutdown));
                    entry.handle.take()
                })
                .collect()
        };
        let signalled = handles.len();

        if signalled > 0 {
            info!(count = signalled, "Stopping supervised generation processes");
        }

        let joined = tokio::time::timeout(wait, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;

        if joined.is_err() {
            warn!("Timed out waiting for generation processes to stop");
        }
        signalled
    }
}

impl Shared {
    /// Pump stdout into the broker until exit, timeout or stop request
    async fn drive(
        &self,
        job_id: &str,
        process: &mut dyn GenerationProcess,
        stop_rx: &mut watch::Receiver<Option<StopIntent>>,
        deadline: Instant,
    ) -> RunOutcome {
        if let Some(intent) = *stop_rx.borrow_and_update() {
            return RunOutcome::Stopped(intent);
        }

        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);
        let mut streaming = false;

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    return RunOutcome::Stopped(stop_intent(changed, stop_rx));
                }
                _ = &mut expiry => return RunOutcome::TimedOut,
                chunk = process.next_chunk() => match chunk {
                    Ok(Some(chunk)) => {
                        if stop_rx.borrow().is_some() {
                            continue;
                        }
                        if !streaming {
                            streaming = true;
                            if let Err(e) = self
                                .registry
                                .transition(job_id, JobState::Streaming, None)
                                .await
                            {
                                debug!(job_id = %job_id, error = %e, "Not streaming; discarding output");
                                continue;
                            }
                        }
                        self.broker.publish(job_id, chunk).await;
                    }
                    Ok(None) => break,
                    Err(e) => return RunOutcome::Failed(e),
                },
            }
        }

        tokio::select! {
            biased;
            changed = stop_rx.changed() => RunOutcome::Stopped(stop_intent(changed, stop_rx)),
            _ = &mut expiry => RunOutcome::TimedOut,
            exit = process.wait() => match exit {
                Ok(exit) => RunOutcome::Exited(exit),
                Err(e) => RunOutcome::Failed(e),
            },
        }
    }

    /// Terminate if needed, record the terminal state, close the stream, forget the process
    async fn finish(
        &self,
        job_id: &str,
        outcome: RunOutcome,
        process: Option<&mut Box<dyn GenerationProcess>>,
    ) {
        let needs_kill = !matches!(outcome, RunOutcome::Exited(_));
        if let (true, Some(process)) = (needs_kill, process) {
            if let Err(e) = process.terminate(self.kill_grace).await {
                warn!(job_id = %job_id, error = %e, "Failed to terminate generation process");
            }
        }

        let outcome = {
            let mut live = self.live.lock().await;
            let tagged = live.get(job_id).map(|entry| *entry.stop.borrow());
            let outcome = resolve_outcome(outcome, tagged);
            let (state, reason) = outcome.terminal();
            if let Err(e) = self.registry.transition(job_id, state, Some(reason)).await {
                // Already terminal (caller cancel won): the late exit is discarded
                debug!(job_id = %job_id, error = %e, "Discarding late process outcome");
            }
            live.remove(job_id);
            outcome
        };

        match &outcome {
            RunOutcome::Exited(exit) if !exit.success => warn!(
                job_id = %job_id,
                exit_code = ?exit.code,
                stderr = %exit.stderr.trim(),
                "Generation process exited with failure"
            ),
            RunOutcome::Failed(e) => warn!(job_id = %job_id, error = %e, "Generation process failed"),
            RunOutcome::TimedOut => warn!(job_id = %job_id, "Generation process timed out"),
            _ => {}
        }

        self.broker.close(job_id).await;
    }
}

/// A caller cancel tagged before the outcome is recorded takes priority over it
fn resolve_outcome(outcome: RunOutcome, tagged: Option<Option<StopIntent>>) -> RunOutcome {
    match (outcome, tagged.flatten()) {
        (RunOutcome::Stopped(intent), _) => RunOutcome::Stopped(intent),
        (_, Some(StopIntent::Cancelled)) => RunOutcome::Stopped(StopIntent::Cancelled),
        (outcome, _) => outcome,
    }
}

/// Read the tagged intent after `changed()` resolved; a dropped sender means shutdown
fn stop_intent(
    changed: std::result::Result<(), watch::error::RecvError>,
    stop_rx: &watch::Receiver<Option<StopIntent>>,
) -> StopIntent {
    match changed {
        Ok(()) => (*stop_rx.borrow()).unwrap_or(StopIntent::Shutdown),
        Err(_) => StopIntent::Shutdown,
    }
}
