//! Step tracker: forwards `StepEntered` events to the remote tracking
//! endpoint. Emission never blocks the sequencer; beacons are queued on a
//! bounded channel and posted by a background task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use funnel_core::config::TrackingConfig;
use funnel_core::event_bus::EventSink;
use funnel_core::{FunnelError, FunnelEvent, FunnelResult, SessionContext};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::events::TrackPayload;

pub struct StepTracker {
    sender: mpsc::Sender<TrackPayload>,
    session: Arc<SessionContext>,
    in_flight: Arc<AtomicUsize>,
}

impl StepTracker {
    /// Creates the tracker and spawns its writer on the current tokio
    /// runtime. Fails when called outside a runtime.
    pub fn spawn(config: &TrackingConfig, session: Arc<SessionContext>) -> FunnelResult<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            FunnelError::Transport(format!("no async runtime for tracking: {}", e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FunnelError::Transport(e.to_string()))?;

        let (sender, receiver) = mpsc::channel::<TrackPayload>(config.queue_capacity.max(1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let writer = BeaconWriter {
            client,
            url: config.track_url(),
            in_flight: Arc::clone(&in_flight),
        };
        handle.spawn(writer.run(receiver));

        info!(url = %config.track_url(), "step tracker initialized");
        Ok(Self {
            sender,
            session,
            in_flight,
        })
    }

    /// Beacons queued or being posted.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Waits until every queued beacon was posted or `timeout` elapses.
    /// Returns whether the queue drained.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.pending() > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(pending = self.pending(), "tracking queue not drained before timeout");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

impl EventSink for StepTracker {
    fn emit(&self, event: FunnelEvent) {
        let payload = TrackPayload::from_session(&self.session, event.session_id, event.step_id);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        match self.sender.try_send(payload) {
            Ok(()) => {
                metrics::counter!("tracking.queued").increment(1);
                debug!(step_index = event.step_index, "tracking beacon queued");
            }
            Err(e) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                metrics::counter!("tracking.dropped").increment(1);
                warn!("tracking beacon dropped: {}", e);
            }
        }
    }
}

struct BeaconWriter {
    client: reqwest::Client,
    url: String,
    in_flight: Arc<AtomicUsize>,
}

impl BeaconWriter {
    async fn run(self, mut receiver: mpsc::Receiver<TrackPayload>) {
        while let Some(payload) = receiver.recv().await {
            self.post(&payload).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        debug!("tracking channel closed, writer stopped");
    }

    async fn post(&self, payload: &TrackPayload) {
        match self.client.post(&self.url).json(payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                metrics::counter!("tracking.sent").increment(1);
                debug!(step_id = %payload.step_id, "step tracked");
            }
            Ok(resp) => {
                metrics::counter!("tracking.failed").increment(1);
                error!(
                    step_id = %payload.step_id,
                    status = resp.status().as_u16(),
                    "failed to track step"
                );
            }
            Err(e) => {
                metrics::counter!("tracking.failed").increment(1);
                error!(step_id = %payload.step_id, error = %e, "failed to track step");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::event_bus::step_entered;

    fn unreachable_config() -> TrackingConfig {
        TrackingConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_ms: 500,
            queue_capacity: 2,
            ..TrackingConfig::default()
        }
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let session = Arc::new(SessionContext::new("quiz", "ua"));
        let result = StepTracker::spawn(&unreachable_config(), session);
        assert!(matches!(result, Err(FunnelError::Transport(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_never_fails_caller() {
        let session = Arc::new(SessionContext::new("quiz", "ua"));
        let tracker = StepTracker::spawn(&unreachable_config(), Arc::clone(&session)).unwrap();

        tracker.emit(step_entered(session.session_id(), "landing", 0));
        tracker.emit(step_entered(session.session_id(), "q1", 1));
        assert!(tracker.drain(Duration::from_secs(5)).await);
        assert_eq!(tracker.pending(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_beacons() {
        let session = Arc::new(SessionContext::new("quiz", "ua"));
        let tracker = StepTracker::spawn(&unreachable_config(), Arc::clone(&session)).unwrap();

        // No await between emits: the writer cannot dequeue, so capacity 2 holds.
        for i in 0..5 {
            tracker.emit(step_entered("s", format!("q{}", i), i));
        }
        assert_eq!(tracker.pending(), 2);
        assert!(tracker.drain(Duration::from_secs(5)).await);
    }
}
