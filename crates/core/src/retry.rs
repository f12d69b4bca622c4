//! Rate-limit aware retry around a single reasoning call.

use crate::agents::base::AgentError;
use crate::notify::Notifier;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use vf_protocol::config_models::RetrySettings;
use vf_protocol::ipc::Event;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// The call failed with an error that is not a rate limit.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Every attempt hit a rate limit.
    #[error("max retries exceeded for stage {stage}")]
    MaxRetriesExceeded {
        stage: String,
        attempts: u32,
        last_error: AgentError,
    },
}

/// Backoff schedule and rate-limit classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_wait: Duration,
    pub increment: Duration,
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    signatures: Vec<String>,
}

impl RetryPolicy {
    pub fn new(
        base_wait: Duration,
        increment: Duration,
        max_attempts: u32,
        signatures: Vec<String>,
    ) -> Self {
        Self {
            base_wait,
            increment,
            max_attempts: max_attempts.max(1),
            signatures: signatures.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            Duration::from_secs(settings.base_wait_secs),
            Duration::from_secs(settings.increment_secs),
            settings.max_attempts,
            settings.rate_limit_signatures.clone(),
        )
    }

    /// Wait before retrying after failed attempt `attempt` (1-based).
    pub fn wait_for_attempt(&self, attempt: u32) -> Duration {
        self.base_wait + self.increment * attempt.saturating_sub(1)
    }

    /// Whether `message` carries one of the rate-limit signatures.
    pub fn is_rate_limited(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.signatures.iter().any(|sig| message.contains(sig.as_str()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

/// Wraps reasoning calls with bounded, growing backoff on rate limits.
#[derive(Debug)]
pub struct RetryingInvoker {
    policy: RetryPolicy,
    notifier: Notifier,
    retries: AtomicU64,
}

impl RetryingInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            notifier: Notifier::disabled(),
            retries: AtomicU64::new(0),
        }
    }

    /// Publish a `StageRetrying` event for every retry.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Number of retries performed by this invoker so far.
    pub fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Run `call` until it succeeds, fails with a non rate-limit error, or
    /// the attempt budget is spent.
    ///
    /// The text returned by a successful call is passed through unchanged.
    pub async fn invoke<F, Fut>(&self, stage: &str, mut call: F) -> Result<String, InvokeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, AgentError>>,
    {
        let mut attempt = 1;

        loop {
            let error = match call().await {
                Ok(text) => return Ok(text),
                Err(error) => error,
            };

            if !self.policy.is_rate_limited(&error.to_string()) {
                return Err(InvokeError::Agent(error));
            }

            if attempt >= self.policy.max_attempts {
                tracing::error!(stage, attempts = attempt, "Rate limit persisted, giving up");
                return Err(InvokeError::MaxRetriesExceeded {
                    stage: stage.to_string(),
                    attempts: attempt,
                    last_error: error,
                });
            }

            let wait = self.policy.wait_for_attempt(attempt);
            self.retries.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                stage,
                attempt,
                max_attempts = self.policy.max_attempts,
                wait_secs = wait.as_secs_f64(),
                "Rate limit hit, retrying: {}",
                error
            );
            self.notifier.publish(Event::StageRetrying {
                stage: stage.to_string(),
                attempt,
                max_attempts: self.policy.max_attempts,
                wait_secs: wait.as_secs_f64(),
            });

            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(2),
            Duration::from_millis(1),
            max_attempts,
            RetrySettings::default().rate_limit_signatures,
        )
    }

    fn rate_limited() -> AgentError {
        AgentError::ApiError("HTTP 429 Too Many Requests".to_string())
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for_attempt(1), Duration::from_secs(45));
        assert_eq!(policy.wait_for_attempt(2), Duration::from_secs(60));
        assert_eq!(policy.wait_for_attempt(9), Duration::from_secs(165));
        assert_eq!(policy.max_attempts, 10);
    }

    #[test]
    fn test_waits_are_non_decreasing() {
        let policy = RetryPolicy::default();
        let waits: Vec<_> = (1..=10).map(|n| policy.wait_for_attempt(n)).collect();
        assert!(waits.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_signature_matching_is_case_insensitive() {
        let policy = RetryPolicy::new(
            Duration::ZERO,
            Duration::ZERO,
            3,
            vec!["Rate_Limit".to_string(), "upstream".to_string()],
        );

        assert!(policy.is_rate_limited("error: RATE_LIMIT reached"));
        assert!(policy.is_rate_limited("Upstream connect error"));
        assert!(!policy.is_rate_limited("invalid api key"));
    }

    #[tokio::test]
    async fn test_success_returns_text_unchanged() {
        let invoker = RetryingInvoker::new(fast_policy(3));
        let result = invoker
            .invoke("Vital Analysis", || async { Ok("  raw {text}\n".to_string()) })
            .await;

        assert_eq!(result, Ok("  raw {text}\n".to_string()));
        assert_eq!(invoker.retry_count(), 0);
    }

    #[tokio::test]
    async fn test_succeeds_on_final_attempt() {
        let invoker = RetryingInvoker::new(fast_policy(10));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = invoker
            .invoke("Risk Assessment", move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 10 {
                        Err(rate_limited())
                    } else {
                        Ok("done".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(invoker.retry_count(), 9);
    }

    #[tokio::test]
    async fn test_non_rate_limit_error_is_not_retried() {
        let invoker = RetryingInvoker::new(fast_policy(10));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = invoker
            .invoke("Risk Assessment", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(AgentError::ApiError("invalid api key".to_string()))
                }
            })
            .await;

        assert_eq!(
            result,
            Err(InvokeError::Agent(AgentError::ApiError("invalid api key".to_string())))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(invoker.retry_count(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_is_distinct_error() {
        let invoker = RetryingInvoker::new(fast_policy(3));

        let result = invoker
            .invoke("Decision Action", || async { Err(rate_limited()) })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "max retries exceeded for stage Decision Action");
        assert!(matches!(
            err,
            InvokeError::MaxRetriesExceeded { attempts: 3, .. }
        ));
        assert_eq!(invoker.retry_count(), 2);
    }

    #[tokio::test]
    async fn test_retries_are_published() {
        let (notifier, mut rx) = Notifier::channel(8);
        let invoker = RetryingInvoker::new(fast_policy(2)).with_notifier(notifier);

        let _ = invoker
            .invoke("Symptom Inquiry", || async { Err(rate_limited()) })
            .await;

        match rx.try_recv() {
            Ok(Event::StageRetrying { stage, attempt, max_attempts, .. }) => {
                assert_eq!(stage, "Symptom Inquiry");
                assert_eq!(attempt, 1);
                assert_eq!(max_attempts, 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
