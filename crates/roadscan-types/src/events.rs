use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{road::Prediction, telemetry::PerformanceSample};

/// High-level event bus message kinds moving through the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Lifecycle,
    Prediction,
    Ops,
}

/// Immutable event envelope for logging, display, and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleEvent),
    Prediction(PredictionEvent),
    Ops(OpsEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub phase: LifecyclePhase,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecyclePhase {
    Boot,
    InferenceStarted,
    InferenceStopped,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PredictionEvent {
    /// A frame was classified.
    Classified {
        prediction: Prediction,
        position_ms: u64,
        performance: PerformanceSample,
    },
    /// The tick failed and the label falls back to unknown.
    Failed { position_ms: u64, reason: String },
    /// Inference stopped; the label resets to unknown.
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsEvent {
    pub message: String,
    pub tags: Vec<String>,
}

impl SystemEvent {
    pub fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn lifecycle(phase: LifecyclePhase, details: impl Into<Option<String>>) -> Self {
        Self::new(
            EventKind::Lifecycle,
            EventPayload::Lifecycle(LifecycleEvent {
                phase,
                details: details.into(),
            }),
        )
    }

    pub fn prediction(event: PredictionEvent) -> Self {
        Self::new(EventKind::Prediction, EventPayload::Prediction(event))
    }

    pub fn ops(message: impl Into<String>, tags: &[&str]) -> Self {
        Self::new(
            EventKind::Ops,
            EventPayload::Ops(OpsEvent {
                message: message.into(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_matching_kind() {
        let event = SystemEvent::lifecycle(LifecyclePhase::Boot, Some("ready".to_string()));
        assert_eq!(event.kind, EventKind::Lifecycle);
        let event = SystemEvent::prediction(PredictionEvent::Reset);
        assert_eq!(event.kind, EventKind::Prediction);
        let event = SystemEvent::ops("assets staged", &["assets"]);
        match event.payload {
            EventPayload::Ops(ops) => assert_eq!(ops.tags, vec!["assets".to_string()]),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn events_serialize_to_json() {
        let event = SystemEvent::prediction(PredictionEvent::Failed {
            position_ms: 500,
            reason: "decode".into(),
        });
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["kind"], "Prediction");
    }
}
