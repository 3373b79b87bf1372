// Stream Broker - per-job fan-out of output chunks with a replay buffer

use crate::domain::JobId;
use crate::port::TimeProvider;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Runtime fan-out unit for one job
struct StreamChannel {
    /// Ring buffer of the most recent chunks
    buffer: VecDeque<String>,
    subscribers: Vec<mpsc::Sender<String>>,
    closed: bool,
    closed_at: Option<i64>,
}

impl StreamChannel {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            subscribers: Vec::new(),
            closed: false,
            closed_at: None,
        }
    }
}

/// Receiving end of a subscription
///
/// Yields the replayed backlog then live chunks; `None` means end-of-stream.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Underlying receiver, for adapting into a response body stream
    pub fn into_inner(self) -> mpsc::Receiver<String> {
        self.rx
    }

    fn ended() -> Self {
        let (_, rx) = mpsc::channel(1);
        Self { rx }
    }
}

/// Outcome of a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Buffered and offered to `delivered` subscribers (`dropped` were too slow)
    Accepted { delivered: usize, dropped: usize },
    /// Channel closed or unknown; the chunk was discarded
    Rejected,
}

/// Owns every job's stream channel
///
/// Channels are keyed by job id and evicted independently of the registry.
pub struct StreamBroker {
    channels: Mutex<HashMap<JobId, StreamChannel>>,
    time_provider: Arc<dyn TimeProvider>,
    buffer_capacity: usize,
    subscriber_queue_depth: usize,
    linger_ms: i64,
}

impl StreamBroker {
    /// # Arguments
    /// * `buffer_capacity` - Replay ring size in chunks (at least 1)
    /// * `subscriber_queue_depth` - Live chunks a subscriber may fall behind before being dropped
    /// * `linger` - How long a closed channel survives for late subscribers
    pub fn new(
        time_provider: Arc<dyn TimeProvider>,
        buffer_capacity: usize,
        subscriber_queue_depth: usize,
        linger: Duration,
    ) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            time_provider,
            buffer_capacity: buffer_capacity.max(1),
            subscriber_queue_depth: subscriber_queue_depth.max(1),
            linger_ms: linger.as_millis() as i64,
        }
    }

    /// Create the channel for a job (idempotent)
    pub async fn open(&self, job_id: &str) {
        let mut channels = self.channels.lock().await;
        channels
            .entry(job_id.to_string())
            .or_insert_with(|| StreamChannel::new(self.buffer_capacity));
    }

    /// Append a chunk to the ring buffer and push it to every subscriber
    ///
    /// Never waits on a subscriber: one whose queue is full is dropped.
    pub async fn publish(&self, job_id: &str, chunk: String) -> PublishOutcome {
        let mut channels = self.channels.lock().await;
        let Some(channel) = channels.get_mut(job_id) else {
            return PublishOutcome::Rejected;
        };
        if channel.closed {
            debug!(job_id = %job_id, "Discarding chunk published after close");
            return PublishOutcome::Rejected;
        }

        if channel.buffer.len() == self.buffer_capacity {
            channel.buffer.pop_front();
        }
        channel.buffer.push_back(chunk.clone());

        let before = channel.subscribers.len();
        // Full or disconnected receivers are both dropped
        channel
            .subscribers
            .retain(|tx| tx.try_send(chunk.clone()).is_ok());
        let delivered = channel.subscribers.len();
        let dropped = before - delivered;

        if dropped > 0 {
            warn!(
                job_id = %job_id,
                dropped = dropped,
                "Dropped subscribers that could not keep up or disconnected"
            );
        }

        PublishOutcome::Accepted { delivered, dropped }
    }

    /// Attach a subscriber: replay the buffer in order, then follow live chunks
    ///
    /// For a closed channel the replay is followed by end-of-stream. An unknown
    /// job id (never opened, or already discarded) yields an ended subscription.
    pub async fn subscribe(&self, job_id: &str) -> Subscription {
        let mut channels = self.channels.lock().await;
        let Some(channel) = channels.get_mut(job_id) else {
            return Subscription::ended();
        };

        let (tx, rx) = mpsc::channel(self.buffer_capacity + self.subscriber_queue_depth);
        for chunk in &channel.buffer {
            // Capacity covers the whole ring, so the replay always fits
            if tx.try_send(chunk.clone()).is_err() {
                break;
            }
        }

        if !channel.closed {
            channel.subscribers.push(tx);
        }

        debug!(
            job_id = %job_id,
            replayed = channel.buffer.len(),
            closed = channel.closed,
            "Subscriber attached"
        );
        Subscription { rx }
    }

    /// Mark the channel closed and signal end-of-stream to subscribers
    ///
    /// The buffer is kept for `linger` so late subscribers still see the output.
    pub async fn close(&self, job_id: &str) {
        let now = self.time_provider.now_millis();
        let mut channels = self.channels.lock().await;
        if let Some(channel) = channels.get_mut(job_id) {
            if !channel.closed {
                channel.closed = true;
                channel.closed_at = Some(now);
                // Dropping the senders ends each stream once its queue drains
                channel.subscribers.clear();
            }
        }
    }

    /// Discard closed channels older than the linger window
    pub async fn sweep(&self, now_millis: i64) -> usize {
        let cutoff = now_millis - self.linger_ms;
        let mut channels = self.channels.lock().await;
        let before = channels.len();
        channels.retain(|_, channel| match channel.closed_at {
            Some(closed_at) => closed_at > cutoff,
            None => true,
        });
        before - channels.len()
    }

    pub async fn subscriber_count(&self, job_id: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(job_id)
            .map(|c| c.subscribers.len())
            .unwrap_or(0)
    }

    pub async fn is_closed(&self, job_id: &str) -> Option<bool> {
        self.channels.lock().await.get(job_id).map(|c| c.closed)
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::time_provider::mocks::ManualClock;

    fn broker(capacity: usize, depth: usize) -> (StreamBroker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let broker = StreamBroker::new(clock.clone(), capacity, depth, Duration::from_secs(10));
        (broker, clock)
    }

    async fn drain(mut sub: Subscription) -> Vec<String> {
        let mut out = vec![];
        while let Some(chunk) = sub.recv().await {
            out.push(chunk);
        }
        out
    }

    #[tokio::test]
    async fn test_live_subscriber_sees_publish_order() {
        let (broker, _) = broker(8, 8);
        broker.open("g1").await;
        let sub = broker.subscribe("g1").await;

        for chunk in ["Once ", "upon ", "a ", "time"] {
            broker.publish("g1", chunk.to_string()).await;
        }
        broker.close("g1").await;

        assert_eq!(drain(sub).await, vec!["Once ", "upon ", "a ", "time"]);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_replay_then_live() {
        let (broker, _) = broker(8, 8);
        broker.open("g1").await;
        broker.publish("g1", "a".to_string()).await;
        broker.publish("g1", "b".to_string()).await;

        let sub = broker.subscribe("g1").await;
        broker.publish("g1", "c".to_string()).await;
        broker.close("g1").await;

        assert_eq!(drain(sub).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_ring_buffer_evicts_oldest() {
        let (broker, _) = broker(2, 8);
        broker.open("g1").await;
        for chunk in ["a", "b", "c"] {
            broker.publish("g1", chunk.to_string()).await;
        }
        broker.close("g1").await;

        assert_eq!(drain(broker.subscribe("g1").await).await, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_and_replays_without_blocking() {
        let (broker, _) = broker(4, 4);
        broker.open("g1").await;
        broker.publish("g1", "final".to_string()).await;
        broker.close("g1").await;

        assert_eq!(
            broker.publish("g1", "late".to_string()).await,
            PublishOutcome::Rejected
        );
        assert_eq!(drain(broker.subscribe("g1").await).await, vec!["final"]);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped_not_awaited() {
        let (broker, _) = broker(4, 2);
        broker.open("g1").await;
        let _slow = broker.subscribe("g1").await;
        let mut fast = broker.subscribe("g1").await;

        let mut last = PublishOutcome::Rejected;
        for i in 0..7 {
            last = broker.publish("g1", format!("chunk-{i}")).await;
            if i < 6 {
                // keep the fast subscriber drained
                assert_eq!(fast.recv().await, Some(format!("chunk-{i}")));
            }
        }

        // queue capacity is 4 + 2 = 6: the 7th publish overflows the slow one
        assert_eq!(
            last,
            PublishOutcome::Accepted {
                delivered: 1,
                dropped: 1
            }
        );
        assert_eq!(broker.subscriber_count("g1").await, 1);
    }

    #[tokio::test]
    async fn test_unknown_job_subscription_is_ended() {
        let (broker, _) = broker(4, 4);
        assert!(drain(broker.subscribe("ghost").await).await.is_empty());
        assert_eq!(
            broker.publish("ghost", "x".to_string()).await,
            PublishOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn test_sweep_discards_after_linger() {
        let (broker, clock) = broker(4, 4);
        broker.open("done").await;
        broker.open("live").await;
        broker.close("done").await;

        clock.advance(Duration::from_secs(5));
        assert_eq!(broker.sweep(clock.now_millis()).await, 0);

        clock.advance(Duration::from_secs(6));
        assert_eq!(broker.sweep(clock.now_millis()).await, 1);
        assert_eq!(broker.channel_count().await, 1);
        assert_eq!(broker.is_closed("live").await, Some(false));
    }
}
