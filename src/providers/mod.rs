// Model callers
//
// The pipeline only ever sees `ModelCaller`: a prompt goes in, text comes
// out. `HttpCaller` talks to an OpenAI-compatible endpoint; tests plug in
// scripted stubs.

use async_trait::async_trait;

pub mod openai;
pub mod types;

pub use openai::{HttpCaller, HttpCallerConfig};
pub use types::ModelError;

/// Anything that turns a user prompt into completion text
#[async_trait]
pub trait ModelCaller: Send + Sync {
    /// Send one prompt (paired with the caller's system prompt) and return the reply.
    async fn call(&self, prompt: &str) -> Result<String, ModelError>;

    /// Short label for log lines (usually the model name)
    fn name(&self) -> &str;
}
