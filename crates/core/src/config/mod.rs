//! Configuration loading and management.
//!
//! Settings and stage agent definitions live in the `.vitalflow/`
//! directory. Patient input files are loaded from any path.

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_patient, CONFIG_DIR};
pub use models::AppConfig;
