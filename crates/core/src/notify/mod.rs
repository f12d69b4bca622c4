//! Outbound notifications.
//!
//! Progress events go through an in-process channel owned by whoever
//! delivers them (the CLI printer, a websocket hub, a test). Escalations
//! go through an [`AlertSink`]. Neither path can fail a run: every delivery
//! error is logged and dropped.

mod alerts;

pub use alerts::{AlertSink, EscalationPayload, LogAlertSink, WebhookAlertSink};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use vf_protocol::ipc::Event;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected escalation with status {0}")]
    Rejected(reqwest::StatusCode),
}

/// Best-effort event publisher.
///
/// Cloning is cheap; every clone feeds the same channel.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Event>>,
}

impl Notifier {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A notifier that discards every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create a notifier together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Publish an event without waiting.
    ///
    /// A full or closed channel drops the event with a warning.
    pub fn publish(&self, event: Event) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(subject = ?event.subject_id(), "Event channel full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(subject = ?event.subject_id(), "Event channel closed, dropping event");
            }
        }
    }
}
