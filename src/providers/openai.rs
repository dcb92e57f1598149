// OpenAI-compatible chat completion caller
//
// Works against any server exposing `POST {base_url}/chat/completions`
// (vLLM, llama.cpp server, OpenAI itself). One request per call, no retry:
// a failed unit is skipped by the pipeline and picked up again next run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::types::{ChatMessage, ChatRequest, ChatResponse, ModelError};
use super::ModelCaller;
use crate::config::Config;

/// Everything needed to talk to one endpoint
#[derive(Debug, Clone)]
pub struct HttpCallerConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl HttpCallerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            api_key: config.api.api_key.clone(),
            model: config.api.model.clone(),
            system_prompt: config.system_prompt().to_string(),
            temperature: config.process.temperature,
            max_tokens: config.process.max_tokens,
            timeout: config.process.timeout(),
        }
    }
}

/// Model caller backed by an HTTP endpoint
#[derive(Clone)]
pub struct HttpCaller {
    client: Client,
    url: String,
    config: HttpCallerConfig,
}

impl HttpCaller {
    pub fn new(config: HttpCallerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            url,
            config,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_transport(&self, e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout(self.config.timeout)
        } else {
            ModelError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ModelCaller for HttpCaller {
    async fn call(&self, prompt: &str) -> Result<String, ModelError> {
        info!(
            "Calling model (prompt {} chars, model={})...",
            prompt.chars().count(),
            self.config.model
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport(e))?;

        if !status.is_success() {
            return Err(ModelError::api(status.as_u16(), &body));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|_| ModelError::invalid(&body))?;
        let text = parsed.into_text().ok_or_else(|| ModelError::empty(&body))?;

        debug!("Model returned {} chars", text.chars().count());
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
