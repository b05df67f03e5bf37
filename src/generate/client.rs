//! Text-generation provider client (OpenAI-compatible chat completions).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::GenerateError;
use crate::config::GeneratorConfig;

/// Per-call sampling parameters. The draft stage runs hot, the
/// correction stage runs cold.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Seam for the external text-generation collaborator. Output is
/// untrusted free text; callers own parsing and validation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str, sampling: Sampling) -> Result<String, GenerateError>;
}

/// Concrete provider talking to an OpenAI-compatible chat endpoint.
/// The request timeout is baked into the underlying client; a timeout
/// surfaces as a request failure, never a silent retry.
pub struct ChatProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ChatProvider {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl TextGenerator for ChatProvider {
    async fn generate_text(&self, prompt: &str, sampling: Sampling) -> Result<String, GenerateError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Request("timed out".to_string())
                } else {
                    GenerateError::Request(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GenerateError::Request(e.to_string()))?;

        if status != 200 {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GenerateError::Api { status, message });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| GenerateError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerateError::Parse("no content in response".to_string()))
    }
}
