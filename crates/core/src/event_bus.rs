//! Funnel event bus — trait for emitting step events from the sequencer.
//!
//! The sequencer accepts an `Arc<dyn EventSink>`; the web SDK's tracker
//! implements it to forward step entries to the remote tracking endpoint.

use crate::types::{EventType, FunnelEvent};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Trait for emitting funnel events. Implementations must not block and
/// must not fail the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: FunnelEvent);
}

/// No-op sink for tests and sessions without tracking.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: FunnelEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<FunnelEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<FunnelEvent> {
        self.events.lock().clone()
    }

    pub fn step_ids(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.step_id.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: FunnelEvent) {
        self.events.lock().push(event);
    }
}

/// Convenience builder for a `StepEntered` event.
pub fn step_entered(
    session_id: impl Into<String>,
    step_id: impl Into<String>,
    step_index: usize,
) -> FunnelEvent {
    FunnelEvent {
        event_id: Uuid::new_v4(),
        event_type: EventType::StepEntered,
        session_id: session_id.into(),
        step_id: step_id.into(),
        step_index,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        sink.emit(step_entered("sess-1", "landing", 0));
        sink.emit(step_entered("sess-1", "transition_gender", 1));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.step_ids(), vec!["landing", "transition_gender"]);
        assert_eq!(sink.events()[1].event_type, EventType::StepEntered);

        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_noop_sink_accepts_events() {
        let sink = noop_sink();
        sink.emit(step_entered("sess-1", "landing", 0));
    }
}
