//! Configuration models that aggregate all settings.

use vf_protocol::agent_models::StageAgent;
use vf_protocol::config_models::Settings;
use vf_protocol::run_models::Stage;

/// Unified application configuration loaded from `.vitalflow/`.
///
/// - `config.toml`: global settings
/// - `agents/*.md`: stage agent definitions
///
/// # Example
///
/// ```rust,no_run
/// use vf_core::config::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} stage agents", config.agents.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub settings: Settings,

    /// Stage agents, sorted by stage order.
    pub agents: Vec<StageAgent>,
}

impl AppConfig {
    pub fn agent_for(&self, stage: Stage) -> Option<&StageAgent> {
        self.agents.iter().find(|agent| agent.stage == stage)
    }
}
