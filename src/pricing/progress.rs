//! Progress events and sinks.
//!
//! Progress is pushed to an explicit [`ProgressSink`] handed to the
//! orchestrator. Emitting never blocks and never fails: a sink with no
//! consumer simply drops events.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::{Filter, PricingResult};

/// A structured progress notification.
///
/// Per batch, exactly one [`ProgressEvent::Progress`] is emitted per
/// resource (before its first attempt) and one [`ProgressEvent::Attempt`]
/// per tool invocation. Indices are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Pipeline stage change (emitted by the analyzer, not the core).
    #[serde(rename_all = "camelCase")]
    Stage {
        /// Stage description.
        message: String,
    },
    /// Pricing for a resource is starting.
    #[serde(rename_all = "camelCase")]
    Progress {
        /// 1-based position of the resource.
        resource_index: usize,
        /// Resources in the batch.
        total: usize,
    },
    /// One pricing tool invocation completed (or failed).
    #[serde(rename_all = "camelCase")]
    Attempt {
        /// 1-based position of the resource.
        resource_index: usize,
        /// Resources in the batch.
        total: usize,
        /// 1-based attempt number within the resource.
        attempt_number: usize,
        /// Filter used.
        filter: Filter,
        /// Raw tool result, when the call succeeded.
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<PricingResult>,
        /// Invocation error, when the call failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ProgressEvent {
    /// Creates a stage event.
    pub fn stage(message: impl Into<String>) -> Self {
        Self::Stage {
            message: message.into(),
        }
    }

    /// The `kind` tag as serialized.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Stage { .. } => "stage",
            Self::Progress { .. } => "progress",
            Self::Attempt { .. } => "attempt",
        }
    }
}

/// Receives progress events.
pub trait ProgressSink: Send + Sync {
    /// Delivers one event. Must not block.
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events to a channel; events are dropped once the receiver
/// is gone.
impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

/// Buffers events in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::tests::retail_schema;

    #[test]
    fn test_progress_serialization() {
        let event = ProgressEvent::Progress {
            resource_index: 1,
            total: 3,
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["kind"], "progress");
        assert_eq!(json["resourceIndex"], 1);
        assert_eq!(json["total"], 3);
    }

    #[test]
    fn test_attempt_serialization() {
        let filter = retail_schema()
            .validate_filter(&serde_json::json!({"armRegionName": "eastus"}), false)
            .unwrap_or_else(|_| unreachable!());
        let event = ProgressEvent::Attempt {
            resource_index: 2,
            total: 2,
            attempt_number: 1,
            filter,
            result: Some(PricingResult::default()),
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["kind"], "attempt");
        assert_eq!(json["attemptNumber"], 1);
        assert_eq!(json["filter"]["armRegionName"], "eastus");
        assert_eq!(json["result"]["data"], serde_json::json!([]));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        tx.emit(ProgressEvent::stage("still fine"));
    }

    #[test]
    fn test_collecting_sink_counts() {
        let sink = CollectingSink::new();
        sink.emit(ProgressEvent::stage("a"));
        sink.emit(ProgressEvent::Progress {
            resource_index: 1,
            total: 1,
        });
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.count("stage"), 1);
        assert_eq!(sink.count("attempt"), 0);
    }
}
