//! Persistence for interactions, run records and run outcomes.
//!
//! The store is the single source of truth shared by the polling gateway
//! and whoever answers questions, possibly from another process. Every
//! method is one short, independent operation: no connection or lock is
//! held between calls.

mod error;
mod memory;
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use uuid::Uuid;
use vf_protocol::assessment_models::{ActionDecision, Alert, RiskAssessment};
use vf_protocol::interaction_models::Interaction;
use vf_protocol::run_models::RunRecord;

#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a new interaction.
    ///
    /// A PENDING interaction is rejected with `StoreError::PendingExists`
    /// when its subject already has one.
    async fn insert_interaction(&self, interaction: &Interaction) -> Result<(), StoreError>;

    async fn get_interaction(&self, id: Uuid) -> Result<Option<Interaction>, StoreError>;

    /// Move a PENDING interaction to ANSWERED.
    ///
    /// Returns `false` when the interaction is unknown or no longer PENDING.
    async fn answer_interaction(&self, id: Uuid, answer: &str) -> Result<bool, StoreError>;

    /// Move a PENDING interaction to TIMED_OUT. Returns `false` when it
    /// already left PENDING.
    async fn mark_timed_out(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Mark every PENDING interaction of `subject_id` CANCELLED, recording
    /// `note` as the answer. Returns how many were cancelled.
    async fn cancel_pending(&self, subject_id: &str, note: &str) -> Result<u64, StoreError>;

    /// The subject's PENDING interaction, if any.
    async fn pending_interaction(&self, subject_id: &str)
        -> Result<Option<Interaction>, StoreError>;

    /// All interactions of a subject, oldest first.
    async fn list_interactions(&self, subject_id: &str) -> Result<Vec<Interaction>, StoreError>;

    /// Persist the records of a completed run atomically.
    async fn save_outcome(
        &self,
        assessment: &RiskAssessment,
        decision: &ActionDecision,
        alert: Option<&Alert>,
    ) -> Result<(), StoreError>;

    async fn latest_assessment(&self, subject_id: &str)
        -> Result<Option<RiskAssessment>, StoreError>;

    async fn latest_decision(&self, subject_id: &str) -> Result<Option<ActionDecision>, StoreError>;

    /// All alerts of a subject, oldest first.
    async fn list_alerts(&self, subject_id: &str) -> Result<Vec<Alert>, StoreError>;

    /// Insert or replace the record of a run, keyed by run id.
    async fn save_run(&self, run: &RunRecord) -> Result<(), StoreError>;

    /// The most recently started run of a subject.
    async fn latest_run(&self, subject_id: &str) -> Result<Option<RunRecord>, StoreError>;
}
