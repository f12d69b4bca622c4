//! Stage pipeline execution engine.
//!
//! The PipelineEngine drives one run through the five stages in order,
//! threading the accumulated context into each stage and delegating every
//! reasoning call to the AgentManager through the RetryingInvoker.

pub mod prompts;

use crate::agents::base::{AgentEvent, StageRequest, StageTools};
use crate::agents::manager::AgentManager;
use crate::interaction::InteractionGateway;
use crate::notify::Notifier;
use crate::retry::RetryingInvoker;
use crate::state::run::{begin_stage, fail_run, record_stage};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_stream::StreamExt;
use vf_protocol::agent_models::StageAgent;
use vf_protocol::patient_models::PatientData;
use vf_protocol::run_models::{PipelineRun, Stage};

/// The main pipeline execution engine.
pub struct PipelineEngine {
    agent_manager: AgentManager,
    invoker: RetryingInvoker,
    gateway: InteractionGateway,
    instructions: HashMap<Stage, String>,
}

impl PipelineEngine {
    /// Create a new PipelineEngine using the built-in stage instructions.
    ///
    /// # Arguments
    ///
    /// * `agent_manager` - The manager responsible for agent lookup and execution
    /// * `invoker` - Retry policy wrapper for every reasoning call
    /// * `gateway` - Question channel handed to the symptom inquiry stage
    pub fn new(
        agent_manager: AgentManager,
        invoker: RetryingInvoker,
        gateway: InteractionGateway,
    ) -> Self {
        Self {
            agent_manager,
            invoker,
            gateway,
            instructions: HashMap::new(),
        }
    }

    /// Use the instructions of the given agent definitions where present.
    pub fn with_instructions(mut self, agents: &[StageAgent]) -> Self {
        for agent in agents {
            if !agent.instruction.trim().is_empty() {
                self.instructions.insert(agent.stage, agent.instruction.clone());
            }
        }
        self
    }

    pub fn gateway(&self) -> &InteractionGateway {
        &self.gateway
    }

    pub fn invoker(&self) -> &RetryingInvoker {
        &self.invoker
    }

    /// The full instruction sent for `stage`.
    pub fn instruction_for(&self, stage: Stage) -> String {
        let text = self
            .instructions
            .get(&stage)
            .map(String::as_str)
            .unwrap_or_else(|| prompts::default_instruction(stage));
        prompts::stage_instruction(text)
    }

    /// Execute every stage of `run` in order.
    ///
    /// On success the run holds one result per stage and is still RUNNING;
    /// completing it is up to the caller, which processes the outcome
    /// first. On error the run is marked FAILED and the error returned.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage exhausts its retries or fails with a
    /// non-retryable error.
    pub async fn run(
        &self,
        run: &mut PipelineRun,
        patient: &PatientData,
        notifier: &Notifier,
    ) -> Result<()> {
        for stage in Stage::ALL {
            begin_stage(run, stage, notifier);
            tracing::info!(subject = %run.subject_id, stage = %stage, "Stage started");

            let request = StageRequest::new(
                run.subject_id.clone(),
                stage,
                self.instruction_for(stage),
            )
            .with_context(prompts::build_context(patient, &run.results));

            let tools = match stage {
                Stage::SymptomInquiry => {
                    StageTools::with_ask(Arc::new(self.gateway.asker(run.subject_id.clone())))
                }
                _ => StageTools::none(),
            };

            match self.execute_stage(&request, tools).await {
                Ok(text) => {
                    tracing::debug!(stage = %stage, "Stage output: {}", crate::extract::preview(&text));
                    record_stage(run, stage, text, notifier);
                }
                Err(e) => {
                    let message = format!("{} failed: {}", stage, e);
                    tracing::error!(subject = %run.subject_id, "{}", message);
                    fail_run(run, message, notifier);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Run one stage through the retrying invoker.
    async fn execute_stage(&self, request: &StageRequest, tools: StageTools) -> Result<String> {
        let stage_name = request.stage.display_name();

        self.invoker
            .invoke(stage_name, || self.call_agent(request, tools.clone()))
            .await
            .map_err(|e| anyhow!(e))
    }

    /// Execute the stage's agent once and collect its message text.
    async fn call_agent(
        &self,
        request: &StageRequest,
        tools: StageTools,
    ) -> Result<String, crate::agents::base::AgentError> {
        let mut stream = self.agent_manager.execute(request, tools).await?;
        let mut text = String::new();

        while let Some(event) = stream.next().await {
            match event? {
                AgentEvent::Thought(thought) => {
                    tracing::debug!(stage = %request.stage, "[Thought] {}", thought);
                }
                AgentEvent::ToolCall(call) => {
                    tracing::debug!(stage = %request.stage, "[Tool Call] {}", call);
                }
                AgentEvent::MessageChunk(chunk) => text.push_str(&chunk),
                AgentEvent::Completed => break,
            }
        }

        Ok(text)
    }
}
