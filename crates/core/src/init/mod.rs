//! Initialization of a `.vitalflow/` directory.
//!
//! Writes the embedded default settings and, unless minimal, one agent
//! definition per pipeline stage.
//!
//! # Example
//!
//! ```no_run
//! use vf_core::init::{generate_vitalflow_structure, InitOptions};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = InitOptions {
//!     target_dir: PathBuf::from("."),
//!     force: false,
//!     minimal: false,
//! };
//!
//! generate_vitalflow_structure(options).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

pub use error::{InitError, InitResult};
pub use generator::{generate_vitalflow_structure, InitOptions};
pub use templates::{get_template, list_templates};
