//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn, Level};

/// Trait for event sinks that can receive events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "rollback.started")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Tries to emit an event without blocking.
    ///
    /// This method must never panic or return an error to the caller.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// Writes events to the `tracing` log.
///
/// The `workflow_id` of the payload, when present, is lifted into its own
/// field so rollback and retry lines of one workflow can be correlated.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
    prefix: Option<String>,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingEventSink {
    /// Creates a sink that logs every event at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level, prefix: None }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    /// Restricts logging to event types starting with `prefix`, e.g. `"rollback."`.
    #[must_use]
    pub fn only(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn log_event(&self, event_type: &str, data: Option<&serde_json::Value>) {
        if let Some(prefix) = &self.prefix {
            if !event_type.starts_with(prefix.as_str()) {
                return;
            }
        }
        let workflow_id = data
            .and_then(|d| d.get("workflow_id"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("-");

        if self.level >= Level::DEBUG {
            // TRACE and DEBUG compare greater than INFO.
            debug!(event_type, workflow_id, event_data = ?data, "event");
        } else if self.level == Level::INFO {
            info!(event_type, workflow_id, event_data = ?data, "event");
        } else if self.level == Level::WARN {
            warn!(event_type, workflow_id, event_data = ?data, "event");
        } else {
            error!(event_type, workflow_id, event_data = ?data, "event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
    }

    /// Returns the collected event types, in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<serde_json::Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit("test", None).await;
        sink.try_emit("test", Some(serde_json::json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let sink = LoggingEventSink::debug();
        sink.emit("rollback.started", Some(serde_json::json!({"tasks": 3}))).await;
        sink.try_emit("rollback.completed", None);

        let filtered = LoggingEventSink::new(Level::WARN).only("rollback.");
        filtered.try_emit("retry.scheduled", Some(serde_json::json!({"workflow_id": "w-1"})));
        filtered.try_emit("rollback.timed_out", Some(serde_json::json!({"workflow_id": "w-1"})));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged_line(level: Level) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            LoggingEventSink::new(level).try_emit("rollback.timed_out", None);
        });
        let bytes = captured.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_logging_sink_respects_level() {
        assert!(logged_line(Level::ERROR).contains("ERROR"));
        assert!(logged_line(Level::WARN).contains("WARN"));
        assert!(logged_line(Level::INFO).contains("INFO"));
        assert!(logged_line(Level::DEBUG).contains("DEBUG"));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("event1", None).await;
        sink.try_emit("event2", Some(serde_json::json!({"data": true})));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.event_types(), vec!["event1", "event2"]);
    }

    #[tokio::test]
    async fn test_collecting_sink_filter() {
        let sink = CollectingEventSink::new();
        sink.emit("rollback.started", None).await;
        sink.emit("rollback.completed", None).await;
        sink.emit("retry.scheduled", None).await;

        assert_eq!(sink.events_of_type("rollback.").len(), 2);
        assert_eq!(sink.events_of_type("retry.").len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
