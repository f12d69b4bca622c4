//! Configuration file loader for the `.vitalflow/` directory.
//!
//! - `config.toml`: global settings
//! - `agents/*.md`: stage agent definitions with YAML front matter
//!
//! Patient input files are loaded separately by [`load_patient`].

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::models::AppConfig;
use gray_matter::engine::YAML;
use gray_matter::Matter;
use serde::de::DeserializeOwned;
use std::path::Path;
use vf_protocol::agent_models::StageAgent;
use vf_protocol::config_models::Settings;
use vf_protocol::patient_models::PatientData;
use walkdir::WalkDir;

/// Name of the configuration directory under the project root.
pub const CONFIG_DIR: &str = ".vitalflow";

/// Loads all configuration from the `.vitalflow/` directory.
///
/// Missing directories or files yield defaults rather than errors.
///
/// # Errors
///
/// Returns `ConfigError` if a file exists but cannot be read or parsed,
/// or if two agent definitions claim the same stage.
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_dir = root.join(CONFIG_DIR);

    if !config_dir.exists() {
        tracing::debug!("No {} directory under {}", CONFIG_DIR, root.display());
        return Ok(AppConfig::default());
    }

    let settings = load_settings(&config_dir)?;
    let agents = load_agents(&config_dir)?;
    tracing::debug!("Loaded {} stage agents", agents.len());

    Ok(AppConfig { settings, agents })
}

fn load_settings(config_dir: &Path) -> ConfigResult<Settings> {
    let config_path = config_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(Settings::default());
    }

    let content = read(&config_path)?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: config_path,
        source,
    })
}

/// Loads all stage agent definitions from `agents/*.md`, in stage order.
fn load_agents(config_dir: &Path) -> ConfigResult<Vec<StageAgent>> {
    let agents_dir = config_dir.join("agents");

    if !agents_dir.exists() {
        return Ok(Vec::new());
    }

    let mut agents: Vec<StageAgent> = Vec::new();

    for entry in WalkDir::new(&agents_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: agents_dir.clone(),
            source,
        })?;

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let content = read(path)?;
        let matter = Matter::<YAML>::new();
        let parsed = matter.parse(&content);

        let mut agent: StageAgent = parsed
            .data
            .ok_or_else(|| ConfigError::MarkdownParse {
                path: path.to_path_buf(),
                reason: "Missing YAML front matter".to_string(),
            })?
            .deserialize()
            .map_err(|e| ConfigError::MarkdownParse {
                path: path.to_path_buf(),
                reason: format!("Failed to deserialize front matter: {}", e),
            })?;

        if let Some(existing) = agents.iter().find(|a| a.stage == agent.stage) {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!(
                    "stage {} is already handled by agent '{}'",
                    agent.stage, existing.name
                ),
            });
        }

        agent.instruction = parsed.content.trim().to_string();
        agents.push(agent);
    }

    agents.sort_by_key(|agent| agent.stage.index());
    Ok(agents)
}

/// Loads a patient record from a `.yaml`, `.yml`, `.json` or `.toml` file.
pub fn load_patient(path: &Path) -> ConfigResult<PatientData> {
    let content = read(path)?;
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("yaml") | Some("yml") => parse_yaml(path, &content),
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::JsonParse {
            path: path.to_path_buf(),
            source,
        }),
        Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        }),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn parse_yaml<T: DeserializeOwned>(path: &Path, content: &str) -> ConfigResult<T> {
    serde_yaml::from_str(content).map_err(|source| ConfigError::YamlParse {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}
