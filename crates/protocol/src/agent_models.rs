//! Stage agent models for `.vitalflow/agents/*.md`.
//!
//! Each pipeline stage is backed by one agent definition. Agents are
//! defined as Markdown files with YAML front matter.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::run_models::Stage;

/// Represents the reasoning agent bound to one pipeline stage.
///
/// The front matter carries metadata, the file body carries the stage
/// instruction handed to the reasoning call.
///
/// # Example
///
/// ```markdown
/// ---
/// name: vital-analysis
/// stage: vital_analysis
/// description: Evaluates vital signs against standard thresholds
/// model: llama-3.1-8b-instant
/// command: vitalflow-agent
/// args: ["--model", "llama-3.1-8b-instant"]
/// ---
///
/// Compare the [CURRENT VITALS] against standard medical thresholds...
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, TS)]
pub struct StageAgent {
    /// Unique identifier for this agent.
    pub name: String,

    /// The pipeline stage this agent executes.
    pub stage: Stage,

    /// Human-readable description of the agent's purpose.
    #[serde(default)]
    pub description: String,

    /// Model hint. `mock` selects the built-in scripted agent.
    pub model: String,

    /// External command speaking the NDJSON agent protocol.
    ///
    /// When absent the built-in scripted agent is used.
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,

    /// The main content of the .md file, not part of the front matter.
    ///
    /// Skipped during serialization as it is not front matter metadata.
    #[serde(skip)]
    pub instruction: String,
}
