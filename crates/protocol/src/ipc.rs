//! Events pushed from the pipeline to observers.
//!
//! The core never calls back into a request-serving interface. Instead it
//! hands `Event`s to an in-process channel; whoever owns outbound delivery
//! (a websocket hub, the CLI, a test) drains that channel.
//!
//! Uses tagged enum serialization for TypeScript compatibility:
//! ```json
//! {
//!   "type": "waitingForInput",
//!   "payload": {
//!     "subject_id": "patient-42",
//!     "interaction_id": "uuid-here",
//!     "question": "Does the breathlessness worsen when lying down?"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::run_models::{RunResult, RunStatus, Stage};

/// Status updates emitted by the core while a run progresses.
///
/// Delivery is best effort: a full or closed channel drops the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A new run has been started for a subject.
    RunStarted {
        #[ts(type = "string")]
        run_id: Uuid,
        subject_id: String,
    },

    /// A run's status has changed, with an optional human-readable note.
    RunStatusUpdate {
        subject_id: String,
        status: RunStatus,
        stage_index: usize,
        message: Option<String>,
    },

    StageStarted {
        subject_id: String,
        stage: Stage,
    },

    StageCompleted {
        subject_id: String,
        stage: Stage,
    },

    /// A reasoning call hit a rate limit and will be retried.
    StageRetrying {
        stage: String,
        attempt: u32,
        max_attempts: u32,
        wait_secs: f64,
    },

    /// The inquiry stage is waiting on the subject's answer.
    WaitingForInput {
        subject_id: String,
        #[ts(type = "string")]
        interaction_id: Uuid,
        question: String,
    },

    /// An alert was persisted for the subject.
    AlertRaised {
        subject_id: String,
        #[ts(type = "string")]
        alert_id: Uuid,
        message: String,
    },

    RunCompleted {
        subject_id: String,
        result: RunResult,
    },

    RunFailed {
        subject_id: String,
        error: String,
    },
}

impl Event {
    /// The subject this event concerns, if it is subject-scoped.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Event::RunStarted { subject_id, .. }
            | Event::RunStatusUpdate { subject_id, .. }
            | Event::StageStarted { subject_id, .. }
            | Event::StageCompleted { subject_id, .. }
            | Event::WaitingForInput { subject_id, .. }
            | Event::AlertRaised { subject_id, .. }
            | Event::RunCompleted { subject_id, .. }
            | Event::RunFailed { subject_id, .. } => Some(subject_id),
            Event::StageRetrying { .. } => None,
        }
    }
}
