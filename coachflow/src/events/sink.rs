//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, Level};

/// Receives run lifecycle events.
///
/// A sink is handed to each [`PlanPipeline`](crate::ingress::PlanPipeline);
/// there is no process-wide sink.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `event_type` - One of the names in [`event_types`](super::event_types)
    /// * `data` - Optional event payload, always carrying `run_id`
    async fn emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards all events. Used when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&Value>) {
        let field = |key: &str| {
            data.and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };
        let run_id = field("run_id");
        let stage_id = field("stage_id");

        if self.level == Level::DEBUG {
            debug!(
                event_type,
                run_id = %run_id,
                stage_id = %stage_id,
                event_data = ?data,
                "Event: {}", event_type
            );
        } else {
            info!(
                event_type,
                run_id = %run_id,
                stage_id = %stage_id,
                event_data = ?data,
                "Event: {}", event_type
            );
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Keeps every event in memory, for tests and debugging.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// Just the event names, in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Events whose name starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Events that belong to one run.
    #[must_use]
    pub fn events_for_run(&self, run_id: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(_, d)| {
                d.as_ref()
                    .and_then(|d| d.get("run_id"))
                    .and_then(Value::as_str)
                    == Some(run_id)
            })
            .cloned()
            .collect()
    }

    /// Drops everything collected so far.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit("stage.started", None).await;
        let sink = LoggingEventSink::debug();
        sink.emit("stage.started", Some(json!({ "run_id": "r1", "stage_id": "objectives" })))
            .await;
        sink.emit("pipeline.completed", Some(json!(["not", "an", "object"])))
            .await;
    }

    #[tokio::test]
    async fn test_collecting_sink_filters() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("pipeline.started", Some(json!({ "run_id": "a" }))).await;
        sink.emit("stage.started", Some(json!({ "run_id": "a", "stage_id": "x" })))
            .await;
        sink.emit("stage.started", Some(json!({ "run_id": "b", "stage_id": "x" })))
            .await;

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.events_for_run("a").len(), 2);
        assert_eq!(
            sink.event_types(),
            vec!["pipeline.started", "stage.started", "stage.started"]
        );

        sink.clear();
        assert!(sink.is_empty());
    }
}
