//! Agent manager routing each pipeline stage to its agent.
//!
//! The `AgentManager` is responsible for:
//! - Building agents from stage definitions
//! - Looking up the agent bound to a stage
//! - Falling back to a secondary agent when the primary is unavailable

use crate::agents::adapters::MockAgent;
use crate::agents::base::{Agent, AgentError, AgentStream, StageRequest, StageTools};
use crate::agents::factory::AgentFactory;
use std::collections::HashMap;
use std::sync::Arc;
use vf_protocol::agent_models::StageAgent;
use vf_protocol::run_models::Stage;

/// Maintains the stage → agent registry.
pub struct AgentManager {
    agents: HashMap<Stage, Arc<dyn Agent>>,
    fallback: Option<Arc<dyn Agent>>,
}

impl AgentManager {
    /// Create a manager from stage agent definitions.
    ///
    /// When two definitions name the same stage, the later one wins.
    pub fn new(configs: Vec<StageAgent>) -> Self {
        let mut agents: HashMap<Stage, Arc<dyn Agent>> = HashMap::new();

        for config in configs {
            tracing::debug!(agent = %config.name, stage = %config.stage, "Registering stage agent");
            agents.insert(config.stage, AgentFactory::create(&config));
        }

        Self {
            agents,
            fallback: None,
        }
    }

    /// A manager backed by the built-in scripted agent for every stage.
    pub fn builtin() -> Self {
        let mut agents: HashMap<Stage, Arc<dyn Agent>> = HashMap::new();
        for stage in Stage::ALL {
            agents.insert(stage, Arc::new(MockAgent::for_stage(stage)));
        }

        Self {
            agents,
            fallback: None,
        }
    }

    /// Bind `agent` to `stage`, replacing any previous binding.
    pub fn with_agent(mut self, stage: Stage, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(stage, agent);
        self
    }

    /// Set the agent used when a stage's agent is unavailable.
    pub fn with_fallback(mut self, agent: Arc<dyn Agent>) -> Self {
        self.fallback = Some(agent);
        self
    }

    pub fn get_agent(&self, stage: Stage) -> Option<Arc<dyn Agent>> {
        self.agents.get(&stage).cloned()
    }

    pub fn has_agent(&self, stage: Stage) -> bool {
        self.agents.contains_key(&stage)
    }

    /// Stages without a registered agent, in pipeline order.
    pub fn missing_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| !self.agents.contains_key(stage))
            .collect()
    }

    /// Execute a stage request with the stage's agent.
    ///
    /// # Behavior
    ///
    /// 1. Look up the agent bound to the request's stage
    /// 2. Check if it's available
    /// 3. If unavailable and a fallback is configured, try the fallback
    /// 4. Execute with the selected agent
    pub async fn execute(
        &self,
        request: &StageRequest,
        tools: StageTools,
    ) -> Result<AgentStream, AgentError> {
        let Some(agent) = self.get_agent(request.stage) else {
            return Err(AgentError::NotAvailable(format!(
                "No agent registered for stage '{}'",
                request.stage
            )));
        };

        if agent.check_availability().await {
            return agent.execute(request, tools).await;
        }

        if let Some(fallback) = &self.fallback {
            if fallback.check_availability().await {
                tracing::warn!(stage = %request.stage, "Stage agent unavailable, using fallback");
                return fallback.execute(request, tools).await;
            }
        }

        Err(AgentError::NotAvailable(format!(
            "Agent for stage '{}' is not available and no fallback succeeded",
            request.stage
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::base::AgentEvent;
    use tokio_stream::StreamExt;

    fn create_test_config(stage: Stage, model: &str) -> StageAgent {
        StageAgent {
            name: stage.to_string(),
            stage,
            description: format!("Test agent {}", stage),
            model: model.to_string(),
            command: None,
            args: Vec::new(),
            instruction: "Test prompt".to_string(),
        }
    }

    fn request(stage: Stage) -> StageRequest {
        StageRequest::new("subject", stage, "test instruction")
    }

    #[test]
    fn test_agent_manager_new() {
        let manager = AgentManager::new(vec![
            create_test_config(Stage::VitalAnalysis, "mock"),
            create_test_config(Stage::RiskAssessment, "mock"),
        ]);

        assert!(manager.has_agent(Stage::VitalAnalysis));
        assert!(manager.has_agent(Stage::RiskAssessment));
        assert!(!manager.has_agent(Stage::DecisionAction));
        assert_eq!(
            manager.missing_stages(),
            vec![Stage::SymptomInquiry, Stage::ContextAggregation, Stage::DecisionAction]
        );
    }

    #[test]
    fn test_builtin_covers_every_stage() {
        assert!(AgentManager::builtin().missing_stages().is_empty());
    }

    #[tokio::test]
    async fn test_agent_manager_execute_success() {
        let manager = AgentManager::new(vec![create_test_config(Stage::VitalAnalysis, "mock")]);

        let stream = manager
            .execute(&request(Stage::VitalAnalysis), StageTools::none())
            .await
            .unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(AgentEvent::Thought(_))));
        assert_eq!(events[2], Ok(AgentEvent::Completed));
    }

    #[tokio::test]
    async fn test_agent_manager_execute_not_found() {
        let manager = AgentManager::new(Vec::new());

        let result = manager
            .execute(&request(Stage::VitalAnalysis), StageTools::none())
            .await;
        assert!(matches!(result, Err(AgentError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_agent_manager_uses_fallback_when_unavailable() {
        let manager = AgentManager::new(vec![create_test_config(
            Stage::RiskAssessment,
            "test-unavailable-model",
        )])
        .with_fallback(Arc::new(MockAgent::responding("fallback answer")));

        let events: Vec<_> = manager
            .execute(&request(Stage::RiskAssessment), StageTools::none())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            events[1],
            Ok(AgentEvent::MessageChunk("fallback answer".to_string()))
        );
    }

    #[tokio::test]
    async fn test_agent_manager_unavailable_without_fallback() {
        let manager = AgentManager::new(vec![create_test_config(
            Stage::RiskAssessment,
            "test-unavailable-model",
        )]);

        let result = manager
            .execute(&request(Stage::RiskAssessment), StageTools::none())
            .await;
        assert!(matches!(result, Err(AgentError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_with_agent_overrides_binding() {
        let manager = AgentManager::builtin()
            .with_agent(Stage::DecisionAction, Arc::new(MockAgent::responding("override")));

        let events: Vec<_> = manager
            .execute(&request(Stage::DecisionAction), StageTools::none())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events[1], Ok(AgentEvent::MessageChunk("override".to_string())));
    }
}
