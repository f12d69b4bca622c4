//! Mock agent implementations for deterministic testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use vf_core::agents::base::{Agent, AgentError, AgentEvent, AgentStream, StageRequest, StageTools};
use vf_protocol::run_models::Stage;

/// Question the triage agent puts to patients that need follow-up.
pub const FOLLOW_UP_QUESTION: &str = "Does the breathing difficulty get worse when lying down?";

/// Agent that reads the patient block like a clinician would.
///
/// A systolic pressure of 180 or more, or any reported symptom, marks the
/// patient as critical; the inquiry stage then asks one question.
pub struct TriageAgent;

impl TriageAgent {
    fn is_critical(context: &str) -> bool {
        let systolic = field(context, "Blood Pressure")
            .and_then(|bp| bp.split('/').next())
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(0);
        let symptoms = field(context, "Reported Symptoms").unwrap_or("None");

        systolic >= 180 || !(symptoms.eq_ignore_ascii_case("none") || symptoms.is_empty())
    }

    fn respond(stage: Stage, critical: bool, answer: Option<&str>) -> String {
        match (stage, critical) {
            (Stage::VitalAnalysis, true) => {
                r#"{"status": "CRITICAL", "abnormal_findings": ["BP severely elevated"], "requires_symptom_check": true}"#.to_string()
            }
            (Stage::VitalAnalysis, false) => {
                r#"{"status": "NORMAL", "abnormal_findings": [], "requires_symptom_check": false}"#.to_string()
            }
            (Stage::SymptomInquiry, true) => format!(
                "```json\n{{\"symptom_summary\": \"Breathing difficulty\", \"patient_responses\": [{:?}]}}\n```",
                answer.unwrap_or_default()
            ),
            (Stage::SymptomInquiry, false) => {
                r#"{"symptom_summary": "No symptoms reported, patient healthy"}"#.to_string()
            }
            (Stage::ContextAggregation, true) => {
                "Summary: {'clinical_summary': 'Hypertensive crisis with dyspnea', 'trend': 'Worsening',}".to_string()
            }
            (Stage::ContextAggregation, false) => {
                r#"{"clinical_summary": "Healthy patient", "trend": "Stable"}"#.to_string()
            }
            (Stage::RiskAssessment, true) => {
                r#"{"risk_level": "CRITICAL", "risk_score": 92.5, "justification": {"vital_signs_evaluation": "BP 200/100"}, "requires_immediate_action": true}"#.to_string()
            }
            (Stage::RiskAssessment, false) => {
                r#"{"risk_level": "LOW", "risk_score": 8, "justification": "Nominal vitals", "requires_immediate_action": false}"#.to_string()
            }
            (Stage::DecisionAction, true) => {
                r#"{"action": "EMERGENCY", "urgency": "Critical", "doctor_note": "Hypertensive emergency suspected."}"#.to_string()
            }
            (Stage::DecisionAction, false) => {
                r#"{"action": "MONITOR", "urgency": "Normal", "doctor_note": "Routine monitoring."}"#.to_string()
            }
        }
    }
}

#[async_trait]
impl Agent for TriageAgent {
    async fn check_availability(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        request: &StageRequest,
        tools: StageTools,
    ) -> Result<AgentStream, AgentError> {
        let stage = request.stage;
        let critical = Self::is_critical(&request.context);

        let stream = async_stream::stream! {
            let mut answer = None;
            if stage == Stage::SymptomInquiry && critical {
                if let Some(ask) = tools.ask {
                    yield Ok(AgentEvent::ToolCall(format!("ask_patient: {}", FOLLOW_UP_QUESTION)));
                    answer = Some(ask.ask(FOLLOW_UP_QUESTION).await);
                }
            }
            yield Ok(AgentEvent::MessageChunk(Self::respond(stage, critical, answer.as_deref())));
            yield Ok(AgentEvent::Completed);
        };

        Ok(Box::pin(stream))
    }
}

fn field<'a>(context: &'a str, label: &str) -> Option<&'a str> {
    let prefix = format!("{}: ", label);
    context
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .map(str::trim)
}

/// Agent that fails with `message` a fixed number of times, then responds.
pub struct FlakyAgent {
    failures_left: AtomicU32,
    message: String,
    response: String,
    calls: AtomicU32,
}

impl FlakyAgent {
    pub fn new(failures: u32, message: &str, response: &str) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            message: message.to_string(),
            response: response.to_string(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for FlakyAgent {
    async fn check_availability(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _request: &StageRequest,
        _tools: StageTools,
    ) -> Result<AgentStream, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let event = if failing {
            Err(AgentError::ApiError(self.message.clone()))
        } else {
            Ok(AgentEvent::MessageChunk(self.response.clone()))
        };

        let stream = async_stream::stream! {
            yield event;
            yield Ok(AgentEvent::Completed);
        };
        Ok(Box::pin(stream))
    }
}

/// Agent that records every request it receives.
#[derive(Default)]
pub struct RecordingAgent {
    requests: Mutex<Vec<StageRequest>>,
}

impl RecordingAgent {
    pub fn requests(&self) -> Vec<StageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for RecordingAgent {
    async fn check_availability(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        request: &StageRequest,
        tools: StageTools,
    ) -> Result<AgentStream, AgentError> {
        self.requests.lock().unwrap().push(request.clone());
        TriageAgent.execute(request, tools).await
    }
}
