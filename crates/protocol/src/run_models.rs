//! Runtime pipeline run models.
//!
//! This module defines the five reasoning stages, the results they produce
//! and the structures used to report the state of a run to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::interaction_models::Interaction;

/// One sequential step of the pipeline, backed by one reasoning call.
///
/// Stages always execute in declaration order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    VitalAnalysis,
    SymptomInquiry,
    ContextAggregation,
    RiskAssessment,
    DecisionAction,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::VitalAnalysis,
        Stage::SymptomInquiry,
        Stage::ContextAggregation,
        Stage::RiskAssessment,
        Stage::DecisionAction,
    ];

    /// Zero-based position of this stage in the pipeline.
    pub fn index(self) -> usize {
        match self {
            Stage::VitalAnalysis => 0,
            Stage::SymptomInquiry => 1,
            Stage::ContextAggregation => 2,
            Stage::RiskAssessment => 3,
            Stage::DecisionAction => 4,
        }
    }

    /// Human-readable stage name, used in logs and error messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Stage::VitalAnalysis => "Vital Analysis",
            Stage::SymptomInquiry => "Symptom Inquiry",
            Stage::ContextAggregation => "Context Aggregation",
            Stage::RiskAssessment => "Risk Assessment",
            Stage::DecisionAction => "Decision Action",
        }
    }

    /// Label of the prompt block carrying this stage's output downstream.
    pub fn context_label(self) -> &'static str {
        match self {
            Stage::VitalAnalysis => "CONTEXT - VITAL ANALYSIS",
            Stage::SymptomInquiry => "CONTEXT - SYMPTOM INQUIRY",
            Stage::ContextAggregation => "CONTEXT - CLINICAL AGGREGATION",
            Stage::RiskAssessment => "CONTEXT - RISK ASSESSMENT",
            Stage::DecisionAction => "CONTEXT - DECISION ACTION",
        }
    }

    /// Parse a stage from its snake_case or kebab-case identifier.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().replace('-', "_").as_str() {
            "vital_analysis" => Some(Stage::VitalAnalysis),
            "symptom_inquiry" => Some(Stage::SymptomInquiry),
            "context_aggregation" => Some(Stage::ContextAggregation),
            "risk_assessment" => Some(Stage::RiskAssessment),
            "decision_action" => Some(Stage::DecisionAction),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The raw output of one completed stage.
///
/// Immutable once produced. The structured view is derived on demand by
/// the core's result extractor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct StageResult {
    pub stage: Stage,

    /// Text returned by the reasoning call, unchanged.
    pub raw: String,

    pub completed_at: DateTime<Utc>,
}

/// Lifecycle status of a pipeline run.
///
/// Normal progression: Running -> Completed. A run reports
/// WaitingForInput while the inquiry stage has an unanswered question.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    WaitingForInput,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::WaitingForInput => "WAITING_FOR_INPUT",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RUNNING" => Some(RunStatus::Running),
            "WAITING_FOR_INPUT" => Some(RunStatus::WaitingForInput),
            "COMPLETED" => Some(RunStatus::Completed),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One execution of the pipeline for one subject.
#[derive(Serialize, Deserialize, Debug, Clone, TS)]
pub struct PipelineRun {
    #[ts(type = "string")]
    pub id: Uuid,

    pub subject_id: String,

    pub status: RunStatus,

    /// Zero-based index of the stage currently executing.
    pub current_stage: usize,

    /// Completed stage results, in execution order.
    pub results: Vec<StageResult>,

    pub started_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,

    /// Error message for a failed run.
    pub error: Option<String>,
}

impl PipelineRun {
    /// Raw text of a completed stage, if it has run.
    pub fn output_of(&self, stage: Stage) -> Option<&str> {
        self.results
            .iter()
            .find(|result| result.stage == stage)
            .map(|result| result.raw.as_str())
    }
}

/// Durable summary of a run, readable by processes that share the store
/// but not the runner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct RunRecord {
    #[ts(type = "string")]
    pub id: Uuid,

    pub subject_id: String,

    /// Running, Completed or Failed.
    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,

    pub error: Option<String>,
}

impl From<&PipelineRun> for RunRecord {
    fn from(run: &PipelineRun) -> Self {
        Self {
            id: run.id,
            subject_id: run.subject_id.clone(),
            status: run.status,
            started_at: run.started_at,
            finished_at: run.finished_at,
            error: run.error.clone(),
        }
    }
}

/// Condensed verdict of a completed run, as shown to observers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct RunResult {
    pub risk_level: crate::assessment_models::RiskLevel,
    pub risk_score: u8,
    pub reasoning: serde_json::Value,
    pub action: crate::assessment_models::Action,
    pub urgency: crate::assessment_models::Urgency,
    pub alert_raised: bool,
}

/// Answer to a status query for one subject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct SubjectStatus {
    pub subject_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_interaction: Option<Interaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
