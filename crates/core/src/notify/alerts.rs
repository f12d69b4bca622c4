//! Escalation delivery for alerts raised by completed runs.

use super::NotifyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use vf_protocol::assessment_models::{ActionDecision, Alert, RiskAssessment};

/// What an escalation receiver is told about an alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationPayload {
    pub subject_id: String,
    pub alert_id: Uuid,
    pub risk_level: String,
    pub risk_score: u8,
    pub action: String,
    pub urgency: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl EscalationPayload {
    pub fn new(alert: &Alert, assessment: &RiskAssessment, decision: &ActionDecision) -> Self {
        Self {
            subject_id: alert.subject_id.clone(),
            alert_id: alert.id,
            risk_level: assessment.risk_level.as_str().to_string(),
            risk_score: assessment.risk_score,
            action: decision.action.as_str().to_string(),
            urgency: decision.urgency.as_str().to_string(),
            message: alert.message.clone(),
            created_at: alert.created_at,
        }
    }
}

/// Receiver of escalations, e.g. an on-call paging service.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn escalate(&self, payload: &EscalationPayload) -> Result<(), NotifyError>;
}

/// Writes escalations to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn escalate(&self, payload: &EscalationPayload) -> Result<(), NotifyError> {
        tracing::warn!(
            subject = %payload.subject_id,
            alert = %payload.alert_id,
            risk_level = %payload.risk_level,
            risk_score = payload.risk_score,
            action = %payload.action,
            "Escalation raised: {}",
            payload.message
        );
        Ok(())
    }
}

/// Posts escalations as JSON to a webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn escalate(&self, payload: &EscalationPayload) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }

        tracing::info!(alert = %payload.alert_id, url = %self.url, "Escalation delivered");
        Ok(())
    }
}
