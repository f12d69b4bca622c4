//! Run lifecycle transitions.
//!
//! These functions are the only place a `PipelineRun` changes status, and
//! every transition is published to observers.

use crate::notify::Notifier;
use chrono::Utc;
use vf_protocol::ipc::Event;
use vf_protocol::run_models::{PipelineRun, RunResult, RunStatus, Stage, StageResult};
use uuid::Uuid;

/// Create a new run for `subject_id`, positioned at the first stage.
pub fn create_run(subject_id: impl Into<String>) -> PipelineRun {
    PipelineRun {
        id: Uuid::new_v4(),
        subject_id: subject_id.into(),
        status: RunStatus::Running,
        current_stage: 0,
        results: Vec::new(),
        started_at: Utc::now(),
        finished_at: None,
        error: None,
    }
}

fn publish_status(run: &PipelineRun, notifier: &Notifier, message: Option<String>) {
    notifier.publish(Event::RunStatusUpdate {
        subject_id: run.subject_id.clone(),
        status: run.status,
        stage_index: run.current_stage,
        message,
    });
}

/// Announce the run to observers.
pub fn start_run(run: &mut PipelineRun, notifier: &Notifier) {
    run.status = RunStatus::Running;
    notifier.publish(Event::RunStarted {
        run_id: run.id,
        subject_id: run.subject_id.clone(),
    });
    publish_status(run, notifier, Some("Pipeline started".to_string()));
}

/// Move the run to `stage`.
pub fn begin_stage(run: &mut PipelineRun, stage: Stage, notifier: &Notifier) {
    run.current_stage = stage.index();
    notifier.publish(Event::StageStarted {
        subject_id: run.subject_id.clone(),
        stage,
    });
    publish_status(run, notifier, Some(format!("Running {}", stage)));
}

/// Store the raw output of a finished stage.
pub fn record_stage(run: &mut PipelineRun, stage: Stage, raw: String, notifier: &Notifier) {
    run.results.push(StageResult {
        stage,
        raw,
        completed_at: Utc::now(),
    });
    notifier.publish(Event::StageCompleted {
        subject_id: run.subject_id.clone(),
        stage,
    });
}

/// Publish a progress note without changing status.
pub fn report_progress(run: &PipelineRun, notifier: &Notifier, message: impl Into<String>) {
    publish_status(run, notifier, Some(message.into()));
}

/// Mark the run completed with its verdict.
pub fn complete_run(run: &mut PipelineRun, result: RunResult, notifier: &Notifier) {
    run.status = RunStatus::Completed;
    run.finished_at = Some(Utc::now());
    publish_status(run, notifier, None);
    notifier.publish(Event::RunCompleted {
        subject_id: run.subject_id.clone(),
        result,
    });
}

/// Mark the run failed.
pub fn fail_run(run: &mut PipelineRun, error: String, notifier: &Notifier) {
    run.status = RunStatus::Failed;
    run.finished_at = Some(Utc::now());
    run.error = Some(error.clone());
    publish_status(run, notifier, Some(error.clone()));
    notifier.publish(Event::RunFailed {
        subject_id: run.subject_id.clone(),
        error,
    });
}
