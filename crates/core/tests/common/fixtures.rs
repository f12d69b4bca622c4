//! Test fixtures for patients, stores and fully wired runners.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use vf_core::agents::manager::AgentManager;
use vf_core::engine::PipelineEngine;
use vf_core::interaction::InteractionGateway;
use vf_core::notify::Notifier;
use vf_core::retry::{RetryPolicy, RetryingInvoker};
use vf_core::state::PipelineRunner;
use vf_core::store::Store;
use vf_protocol::ipc::Event;
use vf_protocol::patient_models::PatientData;
use vf_protocol::run_models::Stage;

use super::mock_agents::TriageAgent;

pub const POLL_MS: u64 = 10;

/// BP 120/80, HR 72, no symptoms.
pub fn healthy_patient() -> PatientData {
    serde_yaml::from_str(
        r#"
name: Grace
age: 44
gender: F
blood_pressure: "120/80"
heart_rate: "72"
blood_sugar: "90"
meds_taken: true
reported_symptoms: none
"#,
    )
    .unwrap()
}

/// BP 200/100, HR 95, reports breathing difficulty.
pub fn crisis_patient() -> PatientData {
    serde_yaml::from_str(
        r#"
name: Alan
age: 67
gender: M
blood_pressure: "200/100"
heart_rate: "95"
known_conditions: hypertension
initial_symptoms: breathing difficulty
recent_vitals_history:
  - date: "2026-10-01"
    bp: "160/95"
    hr: "88"
    sugar: "110"
"#,
    )
    .unwrap()
}

/// Retry policy with millisecond waits and the default signatures.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        Duration::from_millis(2),
        Duration::from_millis(1),
        max_attempts,
        vec![
            "rate_limit".to_string(),
            "429".to_string(),
            "too many requests".to_string(),
            "upstream".to_string(),
        ],
    )
}

/// The triage agent bound to every stage.
pub fn triage_manager() -> AgentManager {
    let mut manager = AgentManager::builtin();
    for stage in Stage::ALL {
        manager = manager.with_agent(stage, Arc::new(TriageAgent));
    }
    manager
}

pub struct Harness {
    pub runner: PipelineRunner,
    pub events: mpsc::Receiver<Event>,
}

/// A runner over `store` with millisecond polling and retries.
pub fn harness(manager: AgentManager, store: Arc<dyn Store>, max_wait_ms: u64) -> Harness {
    harness_with_policy(manager, store, max_wait_ms, fast_policy(3))
}

pub fn harness_with_policy(
    manager: AgentManager,
    store: Arc<dyn Store>,
    max_wait_ms: u64,
    policy: RetryPolicy,
) -> Harness {
    let (notifier, events) = Notifier::channel(1024);
    let gateway = InteractionGateway::new(
        store,
        notifier.clone(),
        Duration::from_millis(POLL_MS),
        Duration::from_millis(max_wait_ms),
    );
    let invoker = RetryingInvoker::new(policy).with_notifier(notifier.clone());
    let engine = PipelineEngine::new(manager, invoker, gateway);

    Harness {
        runner: PipelineRunner::new(engine, notifier),
        events,
    }
}
