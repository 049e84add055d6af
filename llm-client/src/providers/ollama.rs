//! Ollama provider
//!
//! Talks to a local or remote Ollama server through its native chat API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{error_from_response, parse_failed, request_failed};
use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse, TokenUsage};

pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Provider for an Ollama server
pub struct OllamaProvider {
    model: String,
    host: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(model: &str, host: &str, client: Client) -> Self {
        Self {
            model: model.to_string(),
            host: host.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|e| e.error)
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut messages = Vec::new();
        if let Some(system) = request.system_prompt {
            messages.push(Message {
                role: "system",
                content: system,
            });
        }
        messages.push(Message {
            role: "user",
            content: request.prompt,
        });

        let chat_request = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: Options {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/chat", self.host);
        log::debug!("Sending chat request to {} ({})", url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::ProviderUnavailable(format!(
                        "Ollama is not reachable at {}: {}",
                        self.host, e
                    ))
                } else {
                    request_failed(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(error_from_response(response, error_message).await);
        }

        let chat_response: ChatResponse = response.json().await.map_err(parse_failed)?;

        let usage = match (chat_response.prompt_eval_count, chat_response.eval_count) {
            (None, None) => None,
            (input, output) => Some(TokenUsage {
                input_tokens: input.unwrap_or(0),
                output_tokens: output.unwrap_or(0),
            }),
        };

        Ok(LlmResponse {
            content: chat_response.message.content,
            model: self.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn is_available(&self) -> Result<()> {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            Ok(())
        } else {
            Err(LlmError::ConfigError(format!(
                "Ollama host must be an http(s) URL, got '{}'",
                self.host
            )))
        }
    }
}
