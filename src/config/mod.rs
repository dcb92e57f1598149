// Configuration module
// Public interface for configuration loading

pub mod constants;
mod loader;
mod settings;

pub use loader::{apply_env_overrides, find_config_path, load_config, ConfigError, LoadedConfig};
pub use settings::{ApiConfig, Config, ProcessConfig};
