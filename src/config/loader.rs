// Configuration loader
//
// Walks up from a start directory to the `.knowledgeprism.json` marker; the
// directory holding the marker is the knowledge base root. A `.env` file next
// to the marker is loaded before environment overrides are applied.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::constants::*;
use super::settings::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "{} not found in {} or any parent directory. Run `prism init <dir>` first.",
        CONFIG_FILENAME,
        .start.display()
    )]
    NotFound { start: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A resolved configuration together with the knowledge base root
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
}

/// Find the marker file in `start` or the nearest ancestor.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    let start = fs::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
}

/// Resolve the full config: file, then `.env`, then environment overrides, then defaults.
pub fn load_config(start: &Path) -> Result<LoadedConfig, ConfigError> {
    let config_path = find_config_path(start).ok_or_else(|| ConfigError::NotFound {
        start: start.to_path_buf(),
    })?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let contents = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    let mut config: Config =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?;

    load_dotenv(&base_dir.join(".env"));
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.fill_empty_defaults();
    config.validate()?;

    debug!("Loaded config from {}", config_path.display());

    Ok(LoadedConfig {
        base_dir,
        config_path,
        config,
    })
}

/// Load KEY=VALUE pairs from `.env`; variables already set in the environment win.
fn load_dotenv(path: &Path) {
    if !path.is_file() {
        return;
    }
    match dotenvy::from_path(path) {
        Ok(()) => debug!("Loaded environment from {}", path.display()),
        Err(e) => warn!("Ignoring unreadable {}: {}", path.display(), e),
    }
}

/// Apply `KNOWLEDGE_PRISM_API_*` overrides. `lookup` is injectable for tests.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(base_url) = non_empty(ENV_API_BASE_URL) {
        config.api.base_url = base_url;
    }
    if let Some(model) = non_empty(ENV_API_MODEL) {
        config.api.model = model;
    }
    if let Some(api_key) = non_empty(ENV_API_KEY) {
        config.api.api_key = api_key;
    }
}
