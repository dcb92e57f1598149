// Project-wide constants
//
// Centralised here so file names, defaults and environment variable names
// have one source of truth. Import via `use crate::config::constants::*;`.

/// Marker file that identifies the root of a knowledge base.
pub const CONFIG_FILENAME: &str = ".knowledgeprism.json";

/// Default OpenAI-compatible endpoint (a local inference server).
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8888/v1";

/// Default model name sent in the `model` field of each request.
pub const DEFAULT_MODEL: &str = "unsloth/Qwen3.5-397B-A17B";

/// Placeholder bearer token for local servers that ignore auth.
pub const DEFAULT_API_KEY: &str = "not-needed";

/// Number of atom files sent to the model per grouping call.
pub const DEFAULT_BATCH_SIZE: usize = 5;

pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default maximum tokens for completion requests.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Default model call timeout: 30 minutes. Large local models are slow.
pub const DEFAULT_TIMEOUT_MS: u64 = 1_800_000;

pub const ENV_API_BASE_URL: &str = "KNOWLEDGE_PRISM_API_BASE_URL";
pub const ENV_API_MODEL: &str = "KNOWLEDGE_PRISM_API_MODEL";
pub const ENV_API_KEY: &str = "KNOWLEDGE_PRISM_API_KEY";

/// System turn paired with every pipeline prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a knowledge management expert who extracts \
structured knowledge from technical notes.\n\
Follow the output format in the user's instructions exactly and do not add extra explanation.";
