//! Questions put to the subject while the inquiry stage runs.
//!
//! The gateway persists each question as a PENDING interaction, announces
//! it to observers and then polls the store until somebody answers it or
//! the wait budget runs out. Answers arrive through [`InteractionGateway::submit_answer`],
//! typically from another task or another process sharing the database.

use crate::agents::base::AskHuman;
use crate::notify::Notifier;
use crate::store::{Store, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;
use vf_protocol::config_models::InteractionSettings;
use vf_protocol::interaction_models::{Interaction, InteractionStatus};
use vf_protocol::ipc::Event;

/// Returned to the reasoning call when the subject does not answer in time.
pub const TIMEOUT_SENTINEL: &str =
    "Timeout: Patient did not provide an answer in time. Proceed with available information.";

/// Answer recorded on interactions cancelled by a newer run.
pub const SUPERSEDED_NOTE: &str = "superseded by new run";

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("Interaction {0} not found")]
    NotFound(Uuid),

    #[error("Interaction {id} is {status}, not PENDING")]
    Conflict { id: Uuid, status: InteractionStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persists questions and waits for their answers.
#[derive(Clone)]
pub struct InteractionGateway {
    store: Arc<dyn Store>,
    notifier: Notifier,
    poll_interval: Duration,
    max_wait: Duration,
}

impl InteractionGateway {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Notifier,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            poll_interval,
            max_wait,
        }
    }

    /// Build a gateway from configuration.
    ///
    /// `interactive` selects the longer wait budget used when answers are
    /// typed in by a person.
    pub fn from_settings(
        store: Arc<dyn Store>,
        notifier: Notifier,
        settings: &InteractionSettings,
        interactive: bool,
    ) -> Self {
        let max_wait = if interactive {
            settings.interactive_max_wait_secs
        } else {
            settings.max_wait_secs
        };

        Self::new(
            store,
            notifier,
            Duration::from_secs(settings.poll_interval_secs),
            Duration::from_secs(max_wait),
        )
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Ask `subject_id` a question and wait for the answer.
    ///
    /// Always yields text for the reasoning call: the answer, the timeout
    /// sentinel, or a description of the persistence failure.
    pub async fn ask(&self, subject_id: &str, question: &str) -> String {
        let interaction = Interaction::pending(subject_id, question);

        if let Err(e) = self.store.insert_interaction(&interaction).await {
            tracing::error!(subject = subject_id, "Failed to persist question: {}", e);
            return format!("Error: could not deliver the question to the patient ({}).", e);
        }

        tracing::info!(
            subject = subject_id,
            interaction = %interaction.id,
            "Waiting for patient answer"
        );
        self.notifier.publish(Event::WaitingForInput {
            subject_id: subject_id.to_string(),
            interaction_id: interaction.id,
            question: question.to_string(),
        });

        self.wait_for_answer(&interaction).await
    }

    async fn wait_for_answer(&self, interaction: &Interaction) -> String {
        let deadline = Instant::now() + self.max_wait;

        loop {
            match self.store.get_interaction(interaction.id).await {
                Ok(Some(current)) => match current.status {
                    InteractionStatus::Answered => {
                        if let Some(answer) = current.answer {
                            tracing::info!(interaction = %interaction.id, "Received patient answer");
                            return answer;
                        }
                    }
                    InteractionStatus::Cancelled | InteractionStatus::TimedOut => {
                        tracing::info!(
                            interaction = %interaction.id,
                            status = %current.status,
                            "Question resolved without an answer"
                        );
                        return TIMEOUT_SENTINEL.to_string();
                    }
                    InteractionStatus::Pending => {}
                },
                Ok(None) => {
                    tracing::warn!(interaction = %interaction.id, "Pending question disappeared");
                    return TIMEOUT_SENTINEL.to_string();
                }
                Err(e) => {
                    tracing::warn!(interaction = %interaction.id, "Poll failed: {}", e);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tracing::debug!(interaction = %interaction.id, "No answer yet");
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }

        match self.store.mark_timed_out(interaction.id).await {
            Ok(true) => {
                tracing::warn!(
                    interaction = %interaction.id,
                    "Patient did not answer within {:?}",
                    self.max_wait
                );
                TIMEOUT_SENTINEL.to_string()
            }
            // Answered between the last poll and the deadline
            Ok(false) => match self.store.get_interaction(interaction.id).await {
                Ok(Some(Interaction {
                    status: InteractionStatus::Answered,
                    answer: Some(answer),
                    ..
                })) => answer,
                _ => TIMEOUT_SENTINEL.to_string(),
            },
            Err(e) => {
                tracing::warn!(interaction = %interaction.id, "Failed to mark timeout: {}", e);
                TIMEOUT_SENTINEL.to_string()
            }
        }
    }

    /// Record the answer to a PENDING interaction.
    pub async fn submit_answer(
        &self,
        interaction_id: Uuid,
        answer: &str,
    ) -> Result<Interaction, InteractionError> {
        submit_answer(self.store.as_ref(), interaction_id, answer).await
    }

    /// Cancel every PENDING interaction left behind for `subject_id`.
    pub async fn cancel_stale(&self, subject_id: &str) -> Result<u64, InteractionError> {
        let cancelled = self.store.cancel_pending(subject_id, SUPERSEDED_NOTE).await?;
        if cancelled > 0 {
            tracing::info!(subject = subject_id, cancelled, "Cancelled stale questions");
        }
        Ok(cancelled)
    }

    /// The `AskHuman` capability bound to one subject.
    pub fn asker(&self, subject_id: impl Into<String>) -> SubjectAsker {
        SubjectAsker {
            gateway: self.clone(),
            subject_id: subject_id.into(),
        }
    }
}

/// Answer an interaction directly against a store.
///
/// Used by answering clients that do not run a pipeline themselves.
pub async fn submit_answer(
    store: &dyn Store,
    interaction_id: Uuid,
    answer: &str,
) -> Result<Interaction, InteractionError> {
    if store.answer_interaction(interaction_id, answer).await? {
        return store
            .get_interaction(interaction_id)
            .await?
            .ok_or(InteractionError::NotFound(interaction_id));
    }

    match store.get_interaction(interaction_id).await? {
        Some(existing) => Err(InteractionError::Conflict {
            id: interaction_id,
            status: existing.status,
        }),
        None => Err(InteractionError::NotFound(interaction_id)),
    }
}

/// Gateway handle for one subject, handed to the inquiry stage's agent.
pub struct SubjectAsker {
    gateway: InteractionGateway,
    subject_id: String,
}

#[async_trait]
impl AskHuman for SubjectAsker {
    async fn ask(&self, question: &str) -> String {
        self.gateway.ask(&self.subject_id, question).await
    }
}
