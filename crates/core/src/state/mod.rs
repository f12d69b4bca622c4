//! Run state management.
//!
//! This module provides:
//! - Run lifecycle transitions
//! - PipelineRunner for launching runs and answering status queries

pub mod run;
pub mod runner;

pub use runner::{PipelineRunner, RunHandle};
