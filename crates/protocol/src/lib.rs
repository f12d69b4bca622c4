//! # vf-protocol
//!
//! Core protocol definitions and data models for vitalflow.
//!
//! This crate defines all shared data structures used for:
//! - Configuration file parsing (TOML settings, Markdown stage agents)
//! - Patient input and the records a pipeline run produces
//! - Events pushed from the pipeline to observers
//!
//! ## Modules
//!
//! - [`agent_models`]: Stage agent definitions
//! - [`assessment_models`]: Risk assessments, action decisions and alerts
//! - [`config_models`]: Global settings from config.toml
//! - [`interaction_models`]: Human clarification questions and answers
//! - [`ipc`]: Events emitted by the core to observers
//! - [`patient_models`]: Subject input data
//! - [`run_models`]: Pipeline runs, stages and status reporting
//!
//! ## Design Principles
//!
//! - Minimal dependencies: serde, ts-rs, uuid and chrono
//! - TypeScript generation: All types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other vitalflow crates

pub mod agent_models;
pub mod assessment_models;
pub mod config_models;
pub mod interaction_models;
pub mod ipc;
pub mod patient_models;
pub mod run_models;

// Re-export all public types for convenience
pub use agent_models::*;
pub use assessment_models::*;
pub use config_models::*;
pub use interaction_models::*;
pub use ipc::*;
pub use patient_models::*;
pub use run_models::*;
