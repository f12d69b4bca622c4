//! Base Agent trait and supporting types.

use async_trait::async_trait;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio_stream::Stream;
use vf_protocol::run_models::Stage;

/// Everything a reasoning call needs to execute one stage.
#[derive(Debug, Clone)]
pub struct StageRequest {
    /// The subject being analysed.
    pub subject_id: String,

    pub stage: Stage,

    /// The stage instruction (prompt), including the baseline policy text.
    pub instruction: String,

    /// Subject data and prior stage outputs, in labelled blocks.
    pub context: String,
}

impl StageRequest {
    /// Create a new StageRequest with an empty context.
    pub fn new(subject_id: impl Into<String>, stage: Stage, instruction: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            stage,
            instruction: instruction.into(),
            context: String::new(),
        }
    }

    /// Set the prompt context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// The full prompt text: instruction followed by context.
    pub fn prompt(&self) -> String {
        if self.context.is_empty() {
            self.instruction.clone()
        } else {
            format!("{}\n\n{}", self.instruction, self.context)
        }
    }
}

/// Capability handed to a reasoning call so it can put a question to the
/// subject and wait for the reply.
///
/// Always returns text: the answer, a timeout sentinel, or an error
/// description the reasoning call can act on.
#[async_trait]
pub trait AskHuman: Send + Sync {
    async fn ask(&self, question: &str) -> String;
}

/// Tools available to a reasoning call for one stage.
#[derive(Clone, Default)]
pub struct StageTools {
    /// Present only for the symptom inquiry stage.
    pub ask: Option<Arc<dyn AskHuman>>,
}

impl StageTools {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_ask(ask: Arc<dyn AskHuman>) -> Self {
        Self { ask: Some(ask) }
    }
}

impl fmt::Debug for StageTools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageTools")
            .field("ask", &self.ask.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Thought(String),
    ToolCall(String),
    MessageChunk(String),
    Completed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not available: {0}")]
    NotAvailable(String),
    #[error("API call failed: {0}")]
    ApiError(String),
    #[error("Stream parsing error: {0}")]
    StreamParseError(String),
    #[error("Execution failed: {0}")]
    ExecutionError(String),
}

pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

#[async_trait]
pub trait Agent: Send + Sync {
    async fn check_availability(&self) -> bool;
    async fn execute(
        &self,
        request: &StageRequest,
        tools: StageTools,
    ) -> Result<AgentStream, AgentError>;
}
