//! Fire-and-forget analytics for form progress.
//!
//! Delivery is spawned off the calling task and failures are swallowed
//! with a debug log: analytics never blocks or fails the session, and
//! delivery errors are never surfaced to the user.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// Error type for event delivery. Internal only; never user-visible.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// Event could not be delivered to the collector
    #[error("analytics delivery failed: {0}")]
    Delivery(String),
}

/// What happened in the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// A session was created
    Started,
    /// The user edited a field
    FieldInteraction { field: String },
    /// Completion percentage after a step transition
    Progress { percent: f32 },
    /// The user walked away at the given completion percentage
    Abandoned { percent: f32 },
    /// The form was submitted successfully
    Completed,
}

/// A progress event, stamped with its form type and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Form the event belongs to
    pub form_type: String,
    /// When the event occurred
    pub at: DateTime<Utc>,
    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Event sink with arbitrary transport (HTTP collector, queue, ...).
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Deliver one event.
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Sink that drops everything.
#[derive(Default)]
pub struct NoopSink;

#[async_trait]
impl AnalyticsSink for NoopSink {
    async fn record(&self, _event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

/// Sink that retains events for test introspection.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub async fn recorded(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Reporter owned by one form session.
///
/// With no sink configured every `track_*` call is a no-op.
#[derive(Clone)]
pub struct AnalyticsReporter {
    form_type: String,
    sink: Option<Arc<dyn AnalyticsSink>>,
}

impl AnalyticsReporter {
    /// Reporter delivering to the given sink.
    pub fn new(form_type: impl Into<String>, sink: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            form_type: form_type.into(),
            sink: Some(sink),
        }
    }

    /// Reporter that drops everything.
    pub fn disabled(form_type: impl Into<String>) -> Self {
        Self {
            form_type: form_type.into(),
            sink: None,
        }
    }

    /// The session was created.
    pub fn track_start(&self) {
        self.track(EventKind::Started);
    }

    /// The user edited a field.
    pub fn track_field_interaction(&self, field: &str) {
        self.track(EventKind::FieldInteraction {
            field: field.to_string(),
        });
    }

    /// A step transition happened at the given completion percentage.
    pub fn track_progress(&self, percent: f32) {
        self.track(EventKind::Progress { percent });
    }

    /// The session was abandoned at the given completion percentage.
    pub fn track_abandonment(&self, percent: f32) {
        self.track(EventKind::Abandoned { percent });
    }

    /// The form was submitted.
    pub fn track_completion(&self) {
        self.track(EventKind::Completed);
    }

    fn track(&self, kind: EventKind) {
        let Some(sink) = &self.sink else {
            return;
        };

        let event = AnalyticsEvent {
            form_type: self.form_type.clone(),
            at: Utc::now(),
            kind,
        };

        // Fire and forget: delivery runs off-task and failures are only
        // logged, never propagated to the session.
        let sink = Arc::clone(sink);
        tokio::spawn(async move {
            if let Err(e) = sink.record(event).await {
                debug!(error = %e, "analytics delivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait]
    impl AnalyticsSink for FailingSink {
        async fn record(&self, _event: AnalyticsEvent) -> Result<(), AnalyticsError> {
            Err(AnalyticsError::Delivery("collector offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_events_reach_the_sink() {
        let sink = Arc::new(MemorySink::new());
        let reporter = AnalyticsReporter::new("fee_waiver", sink.clone());

        reporter.track_start();
        reporter.track_field_interaction("monthly_income");
        reporter.track_progress(50.0);

        // Delivery is spawned; give it a tick
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let events = sink.recorded().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, EventKind::Started);
        assert_eq!(events[0].form_type, "fee_waiver");
        assert_eq!(
            events[1].kind,
            EventKind::FieldInteraction {
                field: "monthly_income".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let reporter = AnalyticsReporter::new("fee_waiver", Arc::new(FailingSink));

        // Must not panic or propagate anything
        reporter.track_start();
        reporter.track_completion();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_a_noop() {
        let reporter = AnalyticsReporter::disabled("fee_waiver");
        reporter.track_start();
        reporter.track_abandonment(10.0);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = AnalyticsEvent {
            form_type: "small_claims".to_string(),
            at: Utc::now(),
            kind: EventKind::Progress { percent: 75.0 },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["percent"], 75.0);
        assert_eq!(json["form_type"], "small_claims");
    }
}
