//! Human clarification models.
//!
//! An interaction is created when the inquiry stage asks the subject a
//! question. It leaves the PENDING state exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionStatus {
    /// Waiting for the subject to answer.
    Pending,
    Answered,
    /// Force-resolved because a newer run started for the same subject.
    Cancelled,
    TimedOut,
}

impl InteractionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionStatus::Pending => "PENDING",
            InteractionStatus::Answered => "ANSWERED",
            InteractionStatus::Cancelled => "CANCELLED",
            InteractionStatus::TimedOut => "TIMED_OUT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(InteractionStatus::Pending),
            "ANSWERED" => Some(InteractionStatus::Answered),
            "CANCELLED" => Some(InteractionStatus::Cancelled),
            "TIMED_OUT" => Some(InteractionStatus::TimedOut),
            _ => None,
        }
    }
}

impl fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single question/answer exchange with the subject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct Interaction {
    #[ts(type = "string")]
    pub id: Uuid,

    pub subject_id: String,

    pub question: String,

    /// Answer text, `None` until the interaction leaves PENDING.
    pub answer: Option<String>,

    pub status: InteractionStatus,

    pub created_at: DateTime<Utc>,

    pub answered_at: Option<DateTime<Utc>>,
}

impl Interaction {
    /// Create a new PENDING interaction with a fresh id.
    pub fn pending(subject_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            question: question.into(),
            answer: None,
            status: InteractionStatus::Pending,
            created_at: Utc::now(),
            answered_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == InteractionStatus::Pending
    }
}
