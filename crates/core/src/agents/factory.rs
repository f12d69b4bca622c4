//! Agent factory for creating agent instances from stage definitions.

use crate::agents::adapters::{CommandAgent, MockAgent};
use crate::agents::base::Agent;
use std::sync::Arc;
use vf_protocol::agent_models::StageAgent;

/// Factory for creating agent instances based on configuration.
///
/// A definition with a `command` is served by a `CommandAgent`. Without
/// one, the built-in scripted agent answers with a canned payload for the
/// stage. A few reserved model names select failure modes for tests:
///
/// - `test-failure-model` → an agent whose stream fails
/// - `test-unavailable-model` → an agent that reports itself unavailable
pub struct AgentFactory;

impl AgentFactory {
    pub fn create(config: &StageAgent) -> Arc<dyn Agent> {
        if let Some(command) = &config.command {
            return Arc::new(CommandAgent::new(
                config.name.clone(),
                config.model.clone(),
                command.clone(),
                config.args.clone(),
            ));
        }

        match config.model.as_str() {
            "test-failure-model" => Arc::new(MockAgent::failing()),
            "test-unavailable-model" => Arc::new(MockAgent::unavailable()),
            _ => Arc::new(MockAgent::for_stage(config.stage)),
        }
    }
}
