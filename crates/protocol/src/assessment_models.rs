//! Records derived from a completed run.
//!
//! These are never hand-entered: the runner builds them from the
//! extracted output of the last two stages and persists them once per
//! completed run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

/// Overall risk level assigned by the risk assessment stage.
///
/// `Unknown` is the safe default when the stage output could not be read.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
    Unknown,
}

impl RiskLevel {
    /// Case-insensitive parse. Unrecognised values map to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "LOW" => RiskLevel::Low,
            "MODERATE" | "MEDIUM" => RiskLevel::Moderate,
            "HIGH" => RiskLevel::High,
            "CRITICAL" => RiskLevel::Critical,
            _ => RiskLevel::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::Unknown => "UNKNOWN",
        }
    }

    pub fn is_elevated(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational step chosen by the decision stage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Monitor,
    Alert,
    Emergency,
}

impl Action {
    /// Case-insensitive parse; `ALERT_DOCTOR` is read as `Alert`.
    /// Unrecognised values map to `Monitor`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "ALERT" | "ALERT_DOCTOR" | "ESCALATE" => Action::Alert,
            "EMERGENCY" => Action::Emergency,
            _ => Action::Monitor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Monitor => "MONITOR",
            Action::Alert => "ALERT",
            Action::Emergency => "EMERGENCY",
        }
    }

    pub fn escalates(self) -> bool {
        !matches!(self, Action::Monitor)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
pub enum Urgency {
    Normal,
    High,
    Critical,
}

impl Urgency {
    /// Case-insensitive parse. Unrecognised values map to `Normal`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => Urgency::High,
            "critical" => Urgency::Critical,
            _ => Urgency::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Normal => "Normal",
            Urgency::High => "High",
            Urgency::Critical => "Critical",
        }
    }

    pub fn escalates(self) -> bool {
        !matches!(self, Urgency::Normal)
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted output of the risk assessment stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct RiskAssessment {
    #[ts(type = "string")]
    pub id: Uuid,

    pub subject_id: String,

    pub risk_level: RiskLevel,

    /// Score in `0..=100`.
    pub risk_score: u8,

    /// Free text or a nested report object, stored as produced.
    pub justification: serde_json::Value,

    pub requires_immediate_action: bool,

    pub created_at: DateTime<Utc>,
}

/// Persisted output of the decision stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ActionDecision {
    #[ts(type = "string")]
    pub id: Uuid,

    pub subject_id: String,

    pub action: Action,

    pub urgency: Urgency,

    /// Briefing note for the responsible clinician.
    pub note: String,

    pub created_at: DateTime<Utc>,
}

/// Escalation record raised when a completed run crosses the alert policy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct Alert {
    #[ts(type = "string")]
    pub id: Uuid,

    pub subject_id: String,

    pub alert_type: Action,

    pub message: String,

    /// Set once a clinician acknowledged the escalation.
    pub call_received: bool,

    pub created_at: DateTime<Utc>,
}
