// Model call errors and OpenAI-compatible wire types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::kb::text::truncate_chars;

/// Response bodies quoted in errors are cut to this many characters.
pub const ERROR_BODY_LIMIT: usize = 500;

/// Why a model call produced no usable text
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Empty response: {body}")]
    EmptyCompletion { body: String },

    #[error("Malformed response: {body}")]
    InvalidResponse { body: String },

    #[error("Model call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ModelError {
    pub fn api(status: u16, body: &str) -> Self {
        ModelError::Api {
            status,
            body: truncate_chars(body, ERROR_BODY_LIMIT).to_string(),
        }
    }

    pub fn empty(body: &str) -> Self {
        ModelError::EmptyCompletion {
            body: truncate_chars(body, ERROR_BODY_LIMIT).to_string(),
        }
    }

    pub fn invalid(body: &str) -> Self {
        ModelError::InvalidResponse {
            body: truncate_chars(body, ERROR_BODY_LIMIT).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponseMessage {
    pub content: Option<String>,
}

impl ChatResponse {
    /// `choices[0].message.content`, when present and non-empty.
    pub fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_bodies_are_truncated() {
        let long = "x".repeat(2000);
        match ModelError::api(502, &long) {
            ModelError::Api { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), ERROR_BODY_LIMIT);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ModelError::empty(&long).to_string().len() < 600);
    }

    #[test]
    fn test_into_text() {
        let r: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"hi"}}]}"#).unwrap();
        assert_eq!(r.into_text().as_deref(), Some("hi"));

        let r: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":""}}]}"#).unwrap();
        assert_eq!(r.into_text(), None);

        let r: ChatResponse = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert_eq!(r.into_text(), None);
    }

    #[test]
    fn test_request_shape() {
        let req = ChatRequest {
            model: "m",
            messages: vec![
                ChatMessage { role: "system", content: "s" },
                ChatMessage { role: "user", content: "u" },
            ],
            temperature: 0.3,
            max_tokens: 10,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["messages"][1]["role"], "user");
        assert_eq!(v["max_tokens"], 10);
    }
}
