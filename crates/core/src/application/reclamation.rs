// Reclamation Scheduler
// Periodic eviction of finished jobs and discarded stream channels

use crate::application::broker::StreamBroker;
use crate::application::registry::JobRegistry;
use crate::config::DEFAULT_SWEEP_INTERVAL;
use crate::port::TimeProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What one sweep reclaimed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub jobs_evicted: usize,
    pub channels_discarded: usize,
}

/// Reclamation scheduler
///
/// Bounds memory from abandoned jobs by sweeping the registry and the broker
/// on a timer. Should be spawned in tokio::spawn. A zero period falls back
/// to the default.
pub struct ReclamationScheduler {
    registry: Arc<JobRegistry>,
    broker: Arc<StreamBroker>,
    time_provider: Arc<dyn TimeProvider>,
    every: Duration,
}

impl ReclamationScheduler {
    pub fn new(
        registry: Arc<JobRegistry>,
        broker: Arc<StreamBroker>,
        time_provider: Arc<dyn TimeProvider>,
        every: Duration,
    ) -> Self {
        let every = if every.is_zero() {
            warn!(
                default_ms = DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
                "Zero sweep interval, using default"
            );
            DEFAULT_SWEEP_INTERVAL
        } else {
            every
        };
        Self {
            registry,
            broker,
            time_provider,
            every,
        }
    }

    /// Run the sweep loop until `stop` turns true or its sender is dropped
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        info!(
            interval_ms = self.every.as_millis() as u64,
            "Reclamation scheduler started"
        );

        let mut tick = interval(self.every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing to reclaim yet
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.run_now().await;
                }
                _ = async { let _ = stop.wait_for(|stopped| *stopped).await; } => {
                    info!("Reclamation scheduler stopped");
                    break;
                }
            }
        }
    }

    /// Sweep immediately
    pub async fn run_now(&self) -> SweepStats {
        let now = self.time_provider.now_millis();
        let stats = SweepStats {
            jobs_evicted: self.registry.sweep_expired(now).await,
            channels_discarded: self.broker.sweep(now).await,
        };

        if stats != SweepStats::default() {
            info!(
                jobs_evicted = stats.jobs_evicted,
                channels_discarded = stats.channels_discarded,
                "Reclamation sweep completed"
            );
        } else {
            debug!("Reclamation sweep found nothing to reclaim");
        }
        stats
    }
}
