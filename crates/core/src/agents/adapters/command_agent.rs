//! Adapter for reasoning services reached through an external command.

use crate::agents::base::{Agent, AgentError, AgentStream, StageRequest, StageTools};
use crate::agents::cli_executor::CliExecutor;
use async_trait::async_trait;
use std::path::Path;

/// Runs a stage by spawning `command` and talking to it over NDJSON.
///
/// The model name is passed as `--model <model>` ahead of any configured
/// arguments unless it is empty.
pub struct CommandAgent {
    name: String,
    command: String,
    args: Vec<String>,
}

impl CommandAgent {
    pub fn new(name: String, model: String, command: String, args: Vec<String>) -> Self {
        let mut full_args = Vec::with_capacity(args.len() + 2);
        if !model.is_empty() {
            full_args.push("--model".to_string());
            full_args.push(model);
        }
        full_args.extend(args);

        Self {
            name,
            command,
            args: full_args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn resolves(command: &str) -> bool {
        if command.contains(std::path::MAIN_SEPARATOR) {
            return Path::new(command).is_file();
        }

        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(command).is_file()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Agent for CommandAgent {
    async fn check_availability(&self) -> bool {
        Self::resolves(&self.command)
    }

    async fn execute(
        &self,
        request: &StageRequest,
        tools: StageTools,
    ) -> Result<AgentStream, AgentError> {
        tracing::debug!(
            agent = %self.name,
            command = %self.command,
            stage = %request.stage,
            "Spawning command agent"
        );
        Ok(CliExecutor::execute(
            self.command.clone(),
            self.args.clone(),
            request,
            tools,
        ))
    }
}
