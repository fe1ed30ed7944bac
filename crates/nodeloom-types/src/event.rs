//! Event types for the Nodeloom engine event bus.
//!
//! `GraphEvent` is the unified event type broadcast by layout skills and the
//! intent dispatcher. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted while processing skills and intents.
///
/// Consumed by external collaborators (layout engine, UI feedback, telemetry);
/// the engine never waits on a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// A layout or edge-routing pass was requested.
    #[serde(rename_all = "camelCase")]
    EdgeIntentCaptured {
        trigger: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layout_type: Option<String>,
        timestamp: DateTime<Utc>,
        source: String,
    },

    /// The dispatcher started processing an intent.
    #[serde(rename_all = "camelCase")]
    IntentStarted {
        intent_id: Uuid,
        kind: String,
        stages: usize,
    },

    /// One stage of an intent finished (successfully or not).
    #[serde(rename_all = "camelCase")]
    IntentStageCompleted {
        intent_id: Uuid,
        skill_id: String,
        index: usize,
        success: bool,
    },

    /// The intent's token was cancelled before all stages ran.
    #[serde(rename_all = "camelCase")]
    IntentCancelled {
        intent_id: Uuid,
        completed_stages: usize,
    },

    /// The intent stopped, either after its last stage or at the first failure.
    #[serde(rename_all = "camelCase")]
    IntentFinished {
        intent_id: Uuid,
        success: bool,
        duration_ms: u64,
    },
}

impl GraphEvent {
    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EdgeIntentCaptured { .. } => "edgeIntentCaptured",
            Self::IntentStarted { .. } => "intentStarted",
            Self::IntentStageCompleted { .. } => "intentStageCompleted",
            Self::IntentCancelled { .. } => "intentCancelled",
            Self::IntentFinished { .. } => "intentFinished",
        }
    }
}
