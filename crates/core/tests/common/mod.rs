//! Shared helpers for the integration tests: patient fixtures, wired
//! runners, scripted agents and event assertions.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod mock_agents;

pub use assertions::*;
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_agents::*;
