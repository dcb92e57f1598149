// Knowledge prism - incremental journal distillation
// Library exports

pub mod cli;
pub mod config;
pub mod init;
pub mod kb;
pub mod perspective;
pub mod pipeline;
pub mod providers;

pub use config::{load_config, Config, ConfigError, LoadedConfig};
pub use kb::{get_status, KbPaths, Status};
pub use pipeline::{run_pipeline, PipelineOptions, RunSummary};
pub use providers::{HttpCaller, HttpCallerConfig, ModelCaller, ModelError};
