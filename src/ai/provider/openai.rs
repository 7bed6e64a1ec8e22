//! OpenAI API Provider
//!
//! LLM provider using OpenAI's Chat Completions API.
//! A `content_filter` finish reason is reported as a policy block.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::{
    ErrorClassifier, GenerationOptions, LlmProvider, LlmResponse, ResponseTiming,
    TokenUsage, build_http_client, prompt_utils, resolve_api_key,
};
use crate::config::LlmConfig;
use crate::types::{ErrorCategory, LlmError, PilotError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const API_KEY_ENV: &str = "OPENAI_API_KEY";
const PROVIDER: &str = "openai";

const SYSTEM_PROMPT: &str = "You are a careful statistical analysis assistant.";

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(config, API_KEY_ENV).ok_or_else(|| {
            PilotError::Config(format!(
                "OpenAI API key not found. Set {} env var or llm.api_key in config",
                API_KEY_ENV
            ))
        })?;

        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
            client: build_http_client(config.timeout_secs)?,
        })
    }

    fn build_request(&self, prompt: &str, options: GenerationOptions) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt_utils::build_json_instruction_prompt(
                        SYSTEM_PROMPT,
                        options.json_mode,
                    ),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: options.temperature,
            // json_object response_format is not used: it rejects top-level arrays
            max_tokens: Some(self.max_tokens),
        }
    }

    fn extract_text(body: ChatCompletionResponse) -> Result<(String, TokenUsage)> {
        let usage = body
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                "No choices in OpenAI response",
                PROVIDER,
            )
        })?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(PilotError::Blocked {
                provider: PROVIDER.to_string(),
                reason: "content_filter".to_string(),
            });
        }

        match choice.message.content {
            Some(text) if !text.is_empty() => Ok((text, usage)),
            _ => Err(PilotError::Blocked {
                provider: PROVIDER.to_string(),
                reason: choice
                    .message
                    .refusal
                    .unwrap_or_else(|| "Unknown".to_string()),
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<LlmResponse> {
        info!(
            "Generating with OpenAI (model: {}, temperature: {})",
            self.model, options.temperature
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, options);
        let url = format!("{}/chat/completions", self.api_base);

        debug!("Sending request to OpenAI API");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, PROVIDER))?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("OpenAI API error ({}): {}", status, body),
                PROVIDER,
            )
            .into());
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, PROVIDER))?;

        let (text, usage) = Self::extract_text(body)?;
        debug!("Received {} chars from OpenAI", text.len());

        Ok(LlmResponse {
            text,
            usage,
            timing: ResponseTiming::from_duration(elapsed),
        })
    }

    fn name(&self) -> &str {
        PROVIDER
    }

}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> ChatCompletionResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_extract_text() {
        let body = decode(
            r#"{"choices":[{"message":{"content":"[]"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":12,"completion_tokens":3}}"#,
        );
        let (text, usage) = OpenAiProvider::extract_text(body).unwrap();
        assert_eq!(text, "[]");
        assert_eq!(usage.total(), 15);
    }

    #[test]
    fn test_content_filter_is_blocked() {
        let body = decode(
            r#"{"choices":[{"message":{"content":null},"finish_reason":"content_filter"}]}"#,
        );
        assert!(matches!(
            OpenAiProvider::extract_text(body),
            Err(PilotError::Blocked { .. })
        ));
    }

    #[test]
    fn test_no_choices_is_service_error() {
        let body = decode(r#"{"choices":[]}"#);
        assert!(matches!(
            OpenAiProvider::extract_text(body),
            Err(PilotError::Llm(_))
        ));
    }

    #[test]
    fn test_system_prompt_requests_json() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(&config).unwrap();
        let request = provider.build_request("plan", GenerationOptions::json(0.1));
        assert!(request.messages[0].content.contains("valid JSON"));
        assert_eq!(request.messages[1].content, "plan");
        assert!(!format!("{:?}", provider).contains("sk-test"));
    }
}
