//! Directory structure and file generation for `.vitalflow/` initialization.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use crate::config::CONFIG_DIR;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Directory in which `.vitalflow/` is created.
    pub target_dir: PathBuf,

    /// Replace an existing `.vitalflow/` directory.
    pub force: bool,

    /// Write only `config.toml`; stages then use the built-in instructions.
    pub minimal: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
        }
    }
}

/// Generate a `.vitalflow/` directory from the embedded templates.
///
/// ```text
/// .vitalflow/
/// ├── config.toml
/// └── agents/              (unless minimal)
///     ├── vital-analysis.md
///     ├── symptom-inquiry.md
///     ├── context-aggregation.md
///     ├── risk-assessment.md
///     └── decision-action.md
/// ```
///
/// Returns the path of the created directory.
///
/// # Errors
///
/// Returns `InitError::DirectoryExists` if the directory exists and
/// `force` is not set, or an I/O variant if writing fails. With `force`,
/// the existing directory is removed first, database included.
pub async fn generate_vitalflow_structure(options: InitOptions) -> InitResult<PathBuf> {
    let config_dir = options.target_dir.join(CONFIG_DIR);

    if config_dir.exists() {
        if !options.force {
            return Err(InitError::DirectoryExists(config_dir));
        }
        tracing::info!("Replacing existing {}", config_dir.display());
        fs::remove_dir_all(&config_dir).map_err(|source| InitError::DirectoryRemove {
            path: config_dir.clone(),
            source,
        })?;
    }

    fs::create_dir_all(&config_dir).map_err(|source| InitError::DirectoryCreate {
        path: config_dir.clone(),
        source,
    })?;

    write_template_file(&config_dir, "config.toml")?;

    if !options.minimal {
        for agent_path in list_templates("agents/") {
            write_template_file(&config_dir, &agent_path)?;
        }
    }

    Ok(config_dir)
}

fn write_template_file(config_dir: &Path, template_path: &str) -> InitResult<()> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = config_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path,
        source,
    })?;

    tracing::debug!("Wrote {}", template_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::tempdir;
    use vf_protocol::run_models::Stage;

    fn options(dir: &Path, force: bool, minimal: bool) -> InitOptions {
        InitOptions {
            target_dir: dir.to_path_buf(),
            force,
            minimal,
        }
    }

    #[tokio::test]
    async fn test_generated_structure_loads() {
        let dir = tempdir().unwrap();

        let created = generate_vitalflow_structure(options(dir.path(), false, false))
            .await
            .unwrap();
        assert_eq!(created, dir.path().join(".vitalflow"));
        assert!(created.join("agents/risk-assessment.md").exists());

        let config = load_config(dir.path()).await.unwrap();
        let stages: Vec<_> = config.agents.iter().map(|a| a.stage).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        assert!(config
            .agent_for(Stage::SymptomInquiry)
            .unwrap()
            .instruction
            .contains("ask_patient"));
    }

    #[tokio::test]
    async fn test_minimal_writes_only_settings() {
        let dir = tempdir().unwrap();

        generate_vitalflow_structure(options(dir.path(), false, true))
            .await
            .unwrap();

        let config_dir = dir.path().join(".vitalflow");
        assert!(config_dir.join("config.toml").exists());
        assert!(!config_dir.join("agents").exists());
    }

    #[tokio::test]
    async fn test_existing_directory_requires_force() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(".vitalflow");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("stale.txt"), "old").unwrap();

        let result = generate_vitalflow_structure(options(dir.path(), false, false)).await;
        assert!(matches!(result, Err(InitError::DirectoryExists(_))));

        generate_vitalflow_structure(options(dir.path(), true, false))
            .await
            .unwrap();
        assert!(!config_dir.join("stale.txt").exists());
        assert!(config_dir.join("config.toml").exists());
    }
}
