//! # vf-core
//!
//! Core pipeline engine for vitalflow.
//!
//! A run drives one patient's data through five sequential reasoning
//! stages, may pause to ask the patient a question, and ends with a risk
//! assessment, an action decision and possibly an alert, all persisted.
//!
//! ## Modules
//!
//! - [`config`]: `.vitalflow/` settings, stage agents and patient files
//! - [`agents`]: Agent trait and adapter implementations
//! - [`engine`]: Stage pipeline execution
//! - [`retry`]: Rate-limit aware retries around reasoning calls
//! - [`interaction`]: Questions to the patient and their answers
//! - [`extract`]: Structured data from loosely formatted stage output
//! - [`store`]: Persistence of interactions and outcomes
//! - [`notify`]: Progress events and alert escalation
//! - [`state`]: Run lifecycle and the background runner
//! - [`init`]: `.vitalflow/` scaffolding

pub mod agents;
pub mod config;
pub mod engine;
pub mod extract;
pub mod init;
pub mod interaction;
pub mod notify;
pub mod retry;
pub mod state;
pub mod store;
