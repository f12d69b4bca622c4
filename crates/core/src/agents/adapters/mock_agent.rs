//! Scripted agent used for demos and tests.

use crate::agents::base::{Agent, AgentError, AgentEvent, AgentStream, StageRequest, StageTools};
use async_trait::async_trait;
use vf_protocol::run_models::Stage;

#[derive(Clone)]
pub struct MockAgent {
    available: bool,
    events: Vec<Result<AgentEvent, AgentError>>,
    questions: Vec<String>,
}

impl MockAgent {
    pub fn new(available: bool, events: Vec<Result<AgentEvent, AgentError>>) -> Self {
        Self {
            available,
            events,
            questions: Vec::new(),
        }
    }

    pub fn success() -> Self {
        Self::responding("Mock response")
    }

    /// Agent that answers every request with `text`.
    pub fn responding(text: impl Into<String>) -> Self {
        Self {
            available: true,
            events: vec![
                Ok(AgentEvent::Thought("Mock agent thinking".to_string())),
                Ok(AgentEvent::MessageChunk(text.into())),
                Ok(AgentEvent::Completed),
            ],
            questions: Vec::new(),
        }
    }

    /// Agent returning a plausible healthy-patient payload for `stage`.
    pub fn for_stage(stage: Stage) -> Self {
        let text = match stage {
            Stage::VitalAnalysis => {
                r#"{"status": "NORMAL", "abnormal_findings": [], "trend_analysis": "No history available", "requires_symptom_check": false}"#
            }
            Stage::SymptomInquiry => {
                r#"{"symptom_summary": "No symptoms reported, patient healthy", "follow_up_questions_asked": [], "patient_responses": []}"#
            }
            Stage::ContextAggregation => {
                r#"{"clinical_summary": "Vitals within normal limits, no symptoms.", "key_risk_factors": [], "trend": "Stable"}"#
            }
            Stage::RiskAssessment => {
                r#"{"risk_level": "LOW", "risk_score": 10, "justification": "Normal vitals and no reported symptoms.", "requires_immediate_action": false}"#
            }
            Stage::DecisionAction => {
                r#"{"action": "MONITOR", "urgency": "Normal", "doctor_note": "Routine monitoring. No action required."}"#
            }
        };
        Self::responding(text)
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            events: vec![],
            questions: Vec::new(),
        }
    }

    pub fn failing() -> Self {
        Self {
            available: true,
            events: vec![
                Ok(AgentEvent::Thought("Starting...".to_string())),
                Err(AgentError::ExecutionError("Mock failure".to_string())),
            ],
            questions: Vec::new(),
        }
    }

    /// Questions to put to the subject before responding.
    ///
    /// Ignored when the stage is not given the ask tool.
    pub fn with_questions(mut self, questions: Vec<String>) -> Self {
        self.questions = questions;
        self
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn execute(
        &self,
        _request: &StageRequest,
        tools: StageTools,
    ) -> Result<AgentStream, AgentError> {
        if !self.available {
            return Err(AgentError::NotAvailable("Mock agent not available".to_string()));
        }

        let events = self.events.clone();
        let questions = self.questions.clone();
        let stream = async_stream::stream! {
            if let Some(ask) = tools.ask {
                for question in questions {
                    yield Ok(AgentEvent::ToolCall(format!("ask_patient: {}", question)));
                    let answer = ask.ask(&question).await;
                    yield Ok(AgentEvent::Thought(format!("Patient answered: {}", answer)));
                }
            }
            for event in events {
                yield event;
            }
        };
        Ok(Box::pin(stream))
    }
}
