//! Agent abstraction and management.
//!
//! This module provides the `Agent` trait (Adapter Pattern), the
//! `AgentFactory` that builds adapters from stage agent definitions and
//! the `AgentManager` that routes each stage to its agent.

pub mod adapters;
pub mod base;
pub mod cli_executor;
pub mod factory;
pub mod manager;

pub use adapters::{CommandAgent, MockAgent};
pub use base::{Agent, AgentError, AgentEvent, AgentStream, AskHuman, StageRequest, StageTools};
pub use factory::AgentFactory;
pub use manager::AgentManager;
