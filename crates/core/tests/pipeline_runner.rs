//! End-to-end runs through PipelineRunner with scripted agents.
//!
//! These tests verify that a run:
//! - pauses for the patient when the inquiry stage asks a question
//! - converges on LOW / MONITOR without questions for healthy patients
//! - completes with reduced information when nobody answers
//! - persists nothing when a stage fails

mod common;

use async_trait::async_trait;
use common::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vf_core::agents::base::AgentEvent;
use vf_core::agents::manager::AgentManager;
use vf_core::agents::MockAgent;
use vf_core::engine::prompts::BASELINE_POLICY;
use vf_core::interaction::{SUPERSEDED_NOTE, TIMEOUT_SENTINEL};
use vf_core::notify::{AlertSink, EscalationPayload, NotifyError};
use vf_core::state::PipelineRunner;
use vf_core::store::{MemoryStore, Store};
use vf_protocol::assessment_models::{Action, RiskLevel, Urgency};
use vf_protocol::interaction_models::InteractionStatus;
use vf_protocol::ipc::Event;
use vf_protocol::run_models::{RunStatus, Stage};

/// Answer the subject's next question once it appears.
fn answer_when_asked(
    runner: PipelineRunner,
    store: Arc<MemoryStore>,
    subject: &'static str,
    answer: &'static str,
) -> tokio::task::JoinHandle<RunStatus> {
    tokio::spawn(async move {
        loop {
            if let Some(pending) = store.pending_interaction(subject).await.unwrap() {
                let seen = runner.status(subject).await.unwrap().unwrap().status;
                runner.submit_answer(pending.id, answer).await.unwrap();
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
}

#[tokio::test]
async fn test_crisis_patient_waits_for_answer_and_raises_alert() {
    let store = Arc::new(MemoryStore::new());
    let Harness { runner, mut events } = harness(triage_manager(), store.clone(), 5_000);

    let answering = answer_when_asked(runner.clone(), store.clone(), "alan", "Yes, much worse");
    let run = runner
        .start_run("alan", crisis_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(answering.await.unwrap(), RunStatus::WaitingForInput);
    assert!(run
        .output_of(Stage::SymptomInquiry)
        .unwrap()
        .contains("Yes, much worse"));

    let events = drain(&mut events);
    assert_event_sequence(&events);
    let waiting = position(&events, |e| matches!(e, Event::WaitingForInput { .. })).unwrap();
    let completed = position(&events, |e| matches!(e, Event::RunCompleted { .. })).unwrap();
    assert!(waiting < completed);
    assert!(has_alert(&events));

    let assessment = store.latest_assessment("alan").await.unwrap().unwrap();
    assert!(matches!(
        assessment.risk_level,
        RiskLevel::High | RiskLevel::Critical
    ));
    assert_eq!(assessment.risk_score, 92);
    assert!(assessment.requires_immediate_action);

    let alerts = store.list_alerts("alan").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, Action::Emergency);
    assert!(!alerts[0].call_received);

    let interactions = store.list_interactions("alan").await.unwrap();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].status, InteractionStatus::Answered);
    assert_eq!(interactions[0].question, FOLLOW_UP_QUESTION);

    let status = runner.status("alan").await.unwrap().unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    let result = status.result.unwrap();
    assert!(result.alert_raised);
    assert_eq!(result.urgency, Urgency::Critical);
}

#[tokio::test]
async fn test_healthy_patient_completes_without_questions() {
    let store = Arc::new(MemoryStore::new());
    let Harness { runner, mut events } = harness(triage_manager(), store.clone(), 5_000);

    let run = runner
        .start_run("grace", healthy_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.results.len(), Stage::ALL.len());

    let events = drain(&mut events);
    assert_event_sequence(&events);
    assert_eq!(waiting_for_input_count(&events), 0);
    assert!(!has_alert(&events));

    assert!(store.list_interactions("grace").await.unwrap().is_empty());
    assert!(store.list_alerts("grace").await.unwrap().is_empty());

    let assessment = store.latest_assessment("grace").await.unwrap().unwrap();
    assert_eq!(assessment.risk_level, RiskLevel::Low);
    let decision = store.latest_decision("grace").await.unwrap().unwrap();
    assert_eq!(decision.action, Action::Monitor);
    assert_eq!(decision.note, "Routine monitoring.");
}

#[tokio::test]
async fn test_unanswered_question_times_out_and_run_completes() {
    let store = Arc::new(MemoryStore::new());
    let Harness { runner, mut events } = harness(triage_manager(), store.clone(), 40);

    let run = runner
        .start_run("alan", crisis_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run
        .output_of(Stage::SymptomInquiry)
        .unwrap()
        .contains(TIMEOUT_SENTINEL));

    let interactions = store.list_interactions("alan").await.unwrap();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].status, InteractionStatus::TimedOut);
    assert!(store.pending_interaction("alan").await.unwrap().is_none());

    let events = drain(&mut events);
    assert_eq!(waiting_for_input_count(&events), 1);
    assert!(matches!(events.last(), Some(Event::RunCompleted { .. })));
}

#[tokio::test]
async fn test_new_run_supersedes_pending_question() {
    let store = Arc::new(MemoryStore::new());
    let Harness { runner, .. } = harness(triage_manager(), store.clone(), 5_000);

    let first = runner.start_run("alan", crisis_patient()).await.unwrap();
    while store.pending_interaction("alan").await.unwrap().is_none() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    // Same subject, now without symptoms: the new run asks nothing
    let second = runner.start_run("alan", healthy_patient()).await.unwrap();
    assert!(store.pending_interaction("alan").await.unwrap().is_none());

    let interactions = store.list_interactions("alan").await.unwrap();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].status, InteractionStatus::Cancelled);
    assert_eq!(interactions[0].answer.as_deref(), Some(SUPERSEDED_NOTE));

    let first = first.wait().await.unwrap();
    let second = second.wait().await.unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert!(first
        .output_of(Stage::SymptomInquiry)
        .unwrap()
        .contains(TIMEOUT_SENTINEL));
    assert_eq!(second.status, RunStatus::Completed);

    // The board follows the newest run whichever finished last
    let status = runner.status("alan").await.unwrap().unwrap();
    assert_eq!(status.result.unwrap().risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_rate_limited_stage_recovers_on_last_attempt() {
    let store = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyAgent::new(
        9,
        "Error code: 429 - rate_limit_exceeded",
        r#"{"status": "NORMAL"}"#,
    ));
    let manager = triage_manager().with_agent(Stage::VitalAnalysis, flaky.clone());
    let Harness { runner, mut events } =
        harness_with_policy(manager, store.clone(), 1_000, fast_policy(10));

    let run = runner
        .start_run("grace", healthy_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(flaky.calls(), 10);

    let waits: Vec<f64> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::StageRetrying { wait_secs, stage, .. } => {
                assert_eq!(stage, "Vital Analysis");
                Some(wait_secs)
            }
            _ => None,
        })
        .collect();
    assert_eq!(waits.len(), 9);
    assert!(waits.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn test_exhausted_retries_fail_run_without_persisting() {
    let store = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyAgent::new(u32::MAX, "upstream connect error", "{}"));
    let manager = triage_manager().with_agent(Stage::RiskAssessment, flaky.clone());
    let Harness { runner, mut events } = harness(manager, store.clone(), 1_000);

    let run = runner
        .start_run("grace", healthy_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(flaky.calls(), 3);
    assert_eq!(run.results.len(), 3);

    let status = runner.status("grace").await.unwrap().unwrap();
    assert_eq!(status.status, RunStatus::Failed);
    assert!(status.result.is_none());
    assert!(status
        .error
        .unwrap()
        .contains("max retries exceeded for stage Risk Assessment"));

    assert!(store.latest_assessment("grace").await.unwrap().is_none());
    assert!(store.latest_decision("grace").await.unwrap().is_none());

    let events = drain(&mut events);
    assert_event_sequence(&events);
    assert!(matches!(events.last(), Some(Event::RunFailed { .. })));
}

#[tokio::test]
async fn test_non_rate_limit_error_fails_immediately() {
    let store = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyAgent::new(1, "invalid api key", "{}"));
    let manager = triage_manager().with_agent(Stage::ContextAggregation, flaky.clone());
    let Harness { runner, mut events } = harness(manager, store.clone(), 1_000);

    let run = runner
        .start_run("grace", healthy_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(flaky.calls(), 1);
    assert!(run.error.unwrap().contains("invalid api key"));

    let retries = drain(&mut events)
        .iter()
        .filter(|e| matches!(e, Event::StageRetrying { .. }))
        .count();
    assert_eq!(retries, 0);
}

#[tokio::test]
async fn test_malformed_final_outputs_fall_back_to_defaults() {
    let store = Arc::new(MemoryStore::new());
    let manager = triage_manager()
        .with_agent(
            Stage::RiskAssessment,
            Arc::new(MockAgent::responding("I could not decide, sorry.")),
        )
        .with_agent(
            Stage::DecisionAction,
            Arc::new(MockAgent::new(
                true,
                vec![
                    Ok(AgentEvent::MessageChunk("```json\n{\"action\": ".to_string())),
                    Ok(AgentEvent::MessageChunk("\"monitor\",}\n```".to_string())),
                    Ok(AgentEvent::Completed),
                ],
            )),
        );
    let Harness { runner, .. } = harness(manager, store.clone(), 1_000);

    let run = runner
        .start_run("grace", healthy_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let assessment = store.latest_assessment("grace").await.unwrap().unwrap();
    assert_eq!(assessment.risk_level, RiskLevel::Unknown);
    assert_eq!(assessment.risk_score, 0);

    let decision = store.latest_decision("grace").await.unwrap().unwrap();
    assert_eq!(decision.action, Action::Monitor);
    assert_eq!(decision.note, vf_core::extract::DEFAULT_NOTE);
    assert!(store.list_alerts("grace").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stages_receive_threaded_context() {
    let store = Arc::new(MemoryStore::new());
    let recorder = Arc::new(RecordingAgent::default());
    let mut manager = AgentManager::builtin();
    for stage in Stage::ALL {
        manager = manager.with_agent(stage, recorder.clone());
    }
    let Harness { runner, .. } = harness(manager, store, 1_000);

    runner
        .start_run("grace", healthy_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    let requests = recorder.requests();
    let stages: Vec<Stage> = requests.iter().map(|r| r.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());

    for request in &requests {
        assert!(request.context.starts_with("[ORIGINAL PATIENT DATA]:\n"));
        assert!(request.context.contains("Blood Pressure: 120/80"));
        assert!(request.instruction.contains(BASELINE_POLICY));
    }
    assert!(!requests[0].context.contains("[CONTEXT -"));

    let risk = &requests[3].context;
    let vital = risk.find("[CONTEXT - VITAL ANALYSIS]").unwrap();
    let inquiry = risk.find("[CONTEXT - SYMPTOM INQUIRY]").unwrap();
    let aggregation = risk.find("[CONTEXT - CLINICAL AGGREGATION]").unwrap();
    assert!(vital < inquiry && inquiry < aggregation);
    assert!(!risk.contains("[CONTEXT - RISK ASSESSMENT]"));
}

#[derive(Default)]
struct RecordingSink {
    payloads: Mutex<Vec<EscalationPayload>>,
    fail: bool,
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn escalate(&self, payload: &EscalationPayload) -> Result<(), NotifyError> {
        self.payloads.lock().unwrap().push(payload.clone());
        if self.fail {
            Err(NotifyError::Rejected(reqwest::StatusCode::BAD_GATEWAY))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn test_escalation_reaches_sink_and_failures_are_swallowed() {
    for fail in [false, true] {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink {
            fail,
            ..Default::default()
        });
        let Harness { runner, .. } = harness(triage_manager(), store.clone(), 30);
        let runner = runner.with_alert_sink(sink.clone());

        let run = runner
            .start_run("alan", crisis_patient())
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed, "fail = {}", fail);
        let payloads = sink.payloads.lock().unwrap().clone();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].action, "EMERGENCY");
        assert_eq!(payloads[0].risk_level, "CRITICAL");
        assert_eq!(store.list_alerts("alan").await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_score_threshold_alone_raises_alert() {
    let store = Arc::new(MemoryStore::new());
    let manager = triage_manager().with_agent(
        Stage::RiskAssessment,
        Arc::new(MockAgent::responding(
            r#"{"risk_level": "MODERATE", "risk_score": 65}"#,
        )),
    );
    let Harness { runner, .. } = harness(manager, store.clone(), 1_000);
    let runner = runner.with_score_threshold(60);

    runner
        .start_run("grace", healthy_patient())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    let alerts = store.list_alerts("grace").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, Action::Alert);
}
