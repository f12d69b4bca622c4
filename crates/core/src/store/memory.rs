//! In-process store for tests and one-shot CLI runs.

use super::{Store, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;
use vf_protocol::assessment_models::{ActionDecision, Alert, RiskAssessment};
use vf_protocol::interaction_models::{Interaction, InteractionStatus};
use vf_protocol::run_models::RunRecord;

#[derive(Default)]
struct Tables {
    interactions: Vec<Interaction>,
    runs: Vec<RunRecord>,
    assessments: Vec<RiskAssessment>,
    decisions: Vec<ActionDecision>,
    alerts: Vec<Alert>,
}

/// Store keeping every record in memory behind one mutex.
///
/// The lock is only held for the duration of a single method call.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_interaction(&self, interaction: &Interaction) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        if interaction.is_pending()
            && tables
                .interactions
                .iter()
                .any(|i| i.subject_id == interaction.subject_id && i.is_pending())
        {
            return Err(StoreError::PendingExists(interaction.subject_id.clone()));
        }

        tables.interactions.push(interaction.clone());
        Ok(())
    }

    async fn get_interaction(&self, id: Uuid) -> Result<Option<Interaction>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.interactions.iter().find(|i| i.id == id).cloned())
    }

    async fn answer_interaction(&self, id: Uuid, answer: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        match tables.interactions.iter_mut().find(|i| i.id == id && i.is_pending()) {
            Some(interaction) => {
                interaction.status = InteractionStatus::Answered;
                interaction.answer = Some(answer.to_string());
                interaction.answered_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_timed_out(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        match tables.interactions.iter_mut().find(|i| i.id == id && i.is_pending()) {
            Some(interaction) => {
                interaction.status = InteractionStatus::TimedOut;
                interaction.answered_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cancel_pending(&self, subject_id: &str, note: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let mut cancelled = 0;

        for interaction in tables
            .interactions
            .iter_mut()
            .filter(|i| i.subject_id == subject_id && i.is_pending())
        {
            interaction.status = InteractionStatus::Cancelled;
            interaction.answer = Some(note.to_string());
            interaction.answered_at = Some(now);
            cancelled += 1;
        }

        Ok(cancelled)
    }

    async fn pending_interaction(
        &self,
        subject_id: &str,
    ) -> Result<Option<Interaction>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .interactions
            .iter()
            .rev()
            .find(|i| i.subject_id == subject_id && i.is_pending())
            .cloned())
    }

    async fn list_interactions(&self, subject_id: &str) -> Result<Vec<Interaction>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .interactions
            .iter()
            .filter(|i| i.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn save_outcome(
        &self,
        assessment: &RiskAssessment,
        decision: &ActionDecision,
        alert: Option<&Alert>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.assessments.push(assessment.clone());
        tables.decisions.push(decision.clone());
        if let Some(alert) = alert {
            tables.alerts.push(alert.clone());
        }
        Ok(())
    }

    async fn latest_assessment(
        &self,
        subject_id: &str,
    ) -> Result<Option<RiskAssessment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assessments
            .iter()
            .rev()
            .find(|a| a.subject_id == subject_id)
            .cloned())
    }

    async fn latest_decision(&self, subject_id: &str) -> Result<Option<ActionDecision>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .decisions
            .iter()
            .rev()
            .find(|d| d.subject_id == subject_id)
            .cloned())
    }

    async fn list_alerts(&self, subject_id: &str) -> Result<Vec<Alert>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .alerts
            .iter()
            .filter(|a| a.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn save_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => tables.runs.push(run.clone()),
        }
        Ok(())
    }

    async fn latest_run(&self, subject_id: &str) -> Result<Option<RunRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .runs
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .max_by_key(|r| r.started_at)
            .cloned())
    }
}
