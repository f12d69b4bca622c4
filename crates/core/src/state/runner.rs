//! Launching pipeline runs and answering status queries.
//!
//! `PipelineRunner` is the entry point for callers: it supersedes stale
//! questions, spawns the run as a background task, turns the final stage
//! outputs into persisted records and keeps a per-subject board of the
//! latest run for status queries.

use crate::engine::PipelineEngine;
use crate::extract::{self, DecisionView, RiskView};
use crate::interaction::{InteractionError, InteractionGateway};
use crate::notify::{AlertSink, EscalationPayload, LogAlertSink, Notifier};
use crate::state::run::{complete_run, create_run, fail_run, report_progress, start_run};
use crate::store::{Store, StoreError};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;
use vf_protocol::assessment_models::{Action, ActionDecision, Alert, RiskAssessment, Urgency};
use vf_protocol::interaction_models::Interaction;
use vf_protocol::ipc::Event;
use vf_protocol::patient_models::PatientData;
use vf_protocol::run_models::{
    PipelineRun, RunRecord, RunResult, RunStatus, Stage, SubjectStatus,
};

/// Score at or above which a run raises an alert.
pub const DEFAULT_SCORE_THRESHOLD: u8 = 80;

/// Handle to a run executing in the background.
pub struct RunHandle {
    pub run_id: Uuid,
    pub subject_id: String,
    handle: JoinHandle<PipelineRun>,
}

impl RunHandle {
    /// Wait for the run to finish and return its final state.
    pub async fn wait(self) -> Result<PipelineRun> {
        self.handle
            .await
            .map_err(|e| anyhow!("Run {} task failed: {}", self.run_id, e))
    }
}

#[derive(Clone)]
struct BoardEntry {
    run_id: Uuid,
    status: SubjectStatus,
}

struct RunnerInner {
    engine: PipelineEngine,
    store: Arc<dyn Store>,
    notifier: Notifier,
    alert_sink: Arc<dyn AlertSink>,
    score_threshold: u8,
    board: Mutex<HashMap<String, BoardEntry>>,
}

/// Starts runs and reports on subjects.
#[derive(Clone)]
pub struct PipelineRunner {
    inner: Arc<RunnerInner>,
}

impl PipelineRunner {
    /// Create a runner around an engine.
    ///
    /// Records are persisted to the store behind the engine's gateway and
    /// escalations are logged until another sink is configured.
    pub fn new(engine: PipelineEngine, notifier: Notifier) -> Self {
        let store = engine.gateway().store().clone();
        Self {
            inner: Arc::new(RunnerInner {
                engine,
                store,
                notifier,
                alert_sink: Arc::new(LogAlertSink),
                score_threshold: DEFAULT_SCORE_THRESHOLD,
                board: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Replace the escalation sink. Must be called before the first run.
    pub fn with_alert_sink(self, alert_sink: Arc<dyn AlertSink>) -> Self {
        self.reconfigure(|inner| inner.alert_sink = alert_sink)
    }

    pub fn with_score_threshold(self, score_threshold: u8) -> Self {
        self.reconfigure(|inner| inner.score_threshold = score_threshold)
    }

    fn reconfigure(self, apply: impl FnOnce(&mut RunnerInner)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                apply(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(shared) => {
                tracing::warn!("Runner already shared; configuration change ignored");
                Self { inner: shared }
            }
        }
    }

    pub fn gateway(&self) -> &InteractionGateway {
        self.inner.engine.gateway()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Start a run for `subject_id` in the background.
    ///
    /// Questions left PENDING by an earlier run of the same subject are
    /// cancelled first, so the new run can ask its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the stale questions cannot be cancelled or the
    /// run cannot be recorded.
    pub async fn start_run(
        &self,
        subject_id: impl Into<String>,
        patient: PatientData,
    ) -> Result<RunHandle> {
        let subject_id = subject_id.into();
        self.gateway().cancel_stale(&subject_id).await?;

        let run = create_run(subject_id.clone());
        let run_id = run.id;
        self.inner
            .store
            .save_run(&RunRecord::from(&run))
            .await
            .map_err(|e| anyhow!("Failed to record run {}: {}", run_id, e))?;
        self.inner
            .set_board(
                run_id,
                SubjectStatus {
                    subject_id: subject_id.clone(),
                    status: RunStatus::Running,
                    pending_interaction: None,
                    result: None,
                    error: None,
                },
            )
            .await;

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.execute(run, patient).await });

        Ok(RunHandle {
            run_id,
            subject_id,
            handle,
        })
    }

    /// Current status of a subject.
    ///
    /// A PENDING question wins, then the latest run started by this
    /// runner unless the store records a newer one, then the latest run
    /// recorded in the store.
    pub async fn status(&self, subject_id: &str) -> Result<Option<SubjectStatus>, StoreError> {
        if let Some(pending) = self.inner.store.pending_interaction(subject_id).await? {
            return Ok(Some(waiting_status(subject_id, pending)));
        }

        let entry = self.inner.board.lock().await.get(subject_id).cloned();
        if let Some(entry) = entry {
            // Another process may have started a newer run on the same store
            let latest = self.inner.store.latest_run(subject_id).await?;
            if latest.map_or(true, |run| run.id == entry.run_id) {
                return Ok(Some(entry.status));
            }
        }

        recorded_status(self.inner.store.as_ref(), subject_id).await
    }

    /// Record the subject's answer to a PENDING question.
    pub async fn submit_answer(
        &self,
        interaction_id: Uuid,
        answer: &str,
    ) -> Result<Interaction, InteractionError> {
        self.gateway().submit_answer(interaction_id, answer).await
    }
}

impl RunnerInner {
    async fn execute(&self, mut run: PipelineRun, patient: PatientData) -> PipelineRun {
        start_run(&mut run, &self.notifier);
        tracing::info!(subject = %run.subject_id, run = %run.id, "Run started");

        let outcome = match self.engine.run(&mut run, &patient, &self.notifier).await {
            Ok(()) => {
                report_progress(&run, &self.notifier, "Processing results");
                self.persist_outcome(&run).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                complete_run(&mut run, result.clone(), &self.notifier);
                self.record_run(&run).await;
                tracing::info!(
                    subject = %run.subject_id,
                    risk_level = %result.risk_level,
                    action = %result.action,
                    "Run completed"
                );
                self.set_board(
                    run.id,
                    SubjectStatus {
                        subject_id: run.subject_id.clone(),
                        status: RunStatus::Completed,
                        pending_interaction: None,
                        result: Some(result),
                        error: None,
                    },
                )
                .await;
            }
            Err(e) => {
                // The engine already failed the run for stage errors
                if run.status != RunStatus::Failed {
                    fail_run(&mut run, e.to_string(), &self.notifier);
                }
                self.record_run(&run).await;
                tracing::error!(subject = %run.subject_id, "Run failed: {:#}", e);
                self.set_board(
                    run.id,
                    SubjectStatus {
                        subject_id: run.subject_id.clone(),
                        status: RunStatus::Failed,
                        pending_interaction: None,
                        result: None,
                        error: run.error.clone(),
                    },
                )
                .await;
            }
        }

        run
    }

    /// Build, persist and escalate the records of a finished run.
    async fn persist_outcome(&self, run: &PipelineRun) -> Result<RunResult> {
        let risk = RiskView::from_map(&extract::extract_text(
            run.output_of(Stage::RiskAssessment).unwrap_or_default(),
        ));
        let decision = DecisionView::from_map(&extract::extract_text(
            run.output_of(Stage::DecisionAction).unwrap_or_default(),
        ));

        let now = Utc::now();
        let assessment = RiskAssessment {
            id: Uuid::new_v4(),
            subject_id: run.subject_id.clone(),
            risk_level: risk.risk_level,
            risk_score: risk.risk_score,
            justification: risk.justification.clone(),
            requires_immediate_action: risk.requires_immediate_action,
            created_at: now,
        };
        let action_decision = ActionDecision {
            id: Uuid::new_v4(),
            subject_id: run.subject_id.clone(),
            action: decision.action,
            urgency: decision.urgency,
            note: decision.note.clone(),
            created_at: now,
        };

        let alert = should_escalate(&risk, &decision, self.score_threshold).then(|| Alert {
            id: Uuid::new_v4(),
            subject_id: run.subject_id.clone(),
            alert_type: match decision.action {
                Action::Monitor => Action::Alert,
                action => action,
            },
            message: decision.note.clone(),
            call_received: false,
            created_at: now,
        });

        self.store
            .save_outcome(&assessment, &action_decision, alert.as_ref())
            .await
            .map_err(|e| anyhow!("Failed to persist outcome: {}", e))?;

        if let Some(alert) = &alert {
            tracing::warn!(subject = %run.subject_id, alert = %alert.id, "Alert raised");
            self.notifier.publish(Event::AlertRaised {
                subject_id: run.subject_id.clone(),
                alert_id: alert.id,
                message: alert.message.clone(),
            });

            let payload = EscalationPayload::new(alert, &assessment, &action_decision);
            if let Err(e) = self.alert_sink.escalate(&payload).await {
                tracing::warn!(alert = %alert.id, "Escalation delivery failed: {}", e);
            }
        }

        Ok(RunResult {
            risk_level: risk.risk_level,
            risk_score: risk.risk_score,
            reasoning: risk.justification,
            action: decision.action,
            urgency: decision.urgency,
            alert_raised: alert.is_some(),
        })
    }

    /// Persist the run's final state for status queries from other
    /// processes. Failures are logged; the run itself is already over.
    async fn record_run(&self, run: &PipelineRun) {
        if let Err(e) = self.store.save_run(&RunRecord::from(run)).await {
            tracing::warn!(run = %run.id, "Failed to record run state: {}", e);
        }
    }

    /// Update the board unless a newer run of the subject took over.
    async fn set_board(&self, run_id: Uuid, status: SubjectStatus) {
        let mut board = self.board.lock().await;
        if let Some(existing) = board.get(&status.subject_id) {
            if existing.run_id != run_id && status.status != RunStatus::Running {
                tracing::debug!(run = %run_id, "Superseded run finished; board unchanged");
                return;
            }
        }
        board.insert(status.subject_id.clone(), BoardEntry { run_id, status });
    }
}

/// Whether a run's outcome crosses the alert policy.
pub fn should_escalate(risk: &RiskView, decision: &DecisionView, score_threshold: u8) -> bool {
    risk.risk_level.is_elevated()
        || risk.risk_score >= score_threshold
        || decision.action.escalates()
        || decision.urgency.escalates()
}

fn waiting_status(subject_id: &str, pending: Interaction) -> SubjectStatus {
    SubjectStatus {
        subject_id: subject_id.to_string(),
        status: RunStatus::WaitingForInput,
        pending_interaction: Some(pending),
        result: None,
        error: None,
    }
}

/// Status of a subject from the store alone.
///
/// Used by clients that share the database but not the runner.
pub async fn stored_status(
    store: &dyn Store,
    subject_id: &str,
) -> Result<Option<SubjectStatus>, StoreError> {
    if let Some(pending) = store.pending_interaction(subject_id).await? {
        return Ok(Some(waiting_status(subject_id, pending)));
    }
    recorded_status(store, subject_id).await
}

/// Status derived from the latest run record.
///
/// A completed run reports the outcome persisted after it started. Without
/// any run record the latest persisted outcome is reported.
async fn recorded_status(
    store: &dyn Store,
    subject_id: &str,
) -> Result<Option<SubjectStatus>, StoreError> {
    let Some(run) = store.latest_run(subject_id).await? else {
        return completed_status(store, subject_id, None).await;
    };

    if run.status == RunStatus::Completed {
        if let Some(status) = completed_status(store, subject_id, Some(run.started_at)).await? {
            return Ok(Some(status));
        }
    }

    Ok(Some(SubjectStatus {
        subject_id: subject_id.to_string(),
        status: run.status,
        pending_interaction: None,
        result: None,
        error: run.error,
    }))
}

async fn completed_status(
    store: &dyn Store,
    subject_id: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Option<SubjectStatus>, StoreError> {
    let Some(assessment) = store.latest_assessment(subject_id).await? else {
        return Ok(None);
    };
    if since.is_some_and(|started_at| assessment.created_at < started_at) {
        return Ok(None);
    }

    let decision = store.latest_decision(subject_id).await?;
    let alert_raised = store
        .list_alerts(subject_id)
        .await?
        .iter()
        .any(|alert| alert.created_at >= assessment.created_at);

    let (action, urgency) = match &decision {
        Some(decision) => (decision.action, decision.urgency),
        None => (Action::Monitor, Urgency::Normal),
    };

    Ok(Some(SubjectStatus {
        subject_id: subject_id.to_string(),
        status: RunStatus::Completed,
        pending_interaction: None,
        result: Some(RunResult {
            risk_level: assessment.risk_level,
            risk_score: assessment.risk_score,
            reasoning: assessment.justification,
            action,
            urgency,
            alert_raised,
        }),
        error: None,
    }))
}
