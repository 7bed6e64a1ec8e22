//! Google Gemini Provider
//!
//! LLM provider using the Generative Language REST API (`generateContent`).
//! A response without candidate text is treated as a policy block and
//! reported with the prompt feedback's block reason.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{
    ErrorClassifier, GenerationOptions, LlmProvider, LlmResponse, ResponseTiming,
    TokenUsage, build_http_client, resolve_api_key,
};
use crate::config::LlmConfig;
use crate::types::{PilotError, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_KEY_ENV: &str = "GEMINI_API_KEY";
const PROVIDER: &str = "gemini";

/// Gemini provider with secure API key handling
pub struct GeminiProvider {
    api_key: SecretString,
    api_base: String,
    model: String,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(config, API_KEY_ENV).ok_or_else(|| {
            PilotError::Config(format!(
                "Gemini API key not found. Set {} env var or llm.api_key in config",
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

    fn build_request(&self, prompt: &str, options: GenerationOptions) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: self.max_tokens,
                response_mime_type: options.json_mode.then(|| "application/json".to_string()),
            },
        }
    }

    /// Turn a decoded response into text, or a block error when nothing came back
    fn extract_text(&self, body: GenerateContentResponse) -> Result<(String, TokenUsage)> {
        let usage = body
            .usage_metadata
            .as_ref()
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        let candidate = body.candidates.into_iter().next();
        let text: String = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if !text.is_empty() {
            return Ok((text, usage));
        }

        let reason = body
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .or_else(|| {
                candidate
                    .and_then(|c| c.finish_reason)
                    .filter(|r| r != "STOP")
            })
            .unwrap_or_else(|| "Unknown".to_string());

        warn!("Gemini returned no content parts (block reason: {})", reason);
        Err(PilotError::Blocked {
            provider: PROVIDER.to_string(),
            reason,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<LlmResponse> {
        info!(
            "Generating with Gemini (model: {}, temperature: {})",
            self.model, options.temperature
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, options);
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);

        debug!("Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
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
                &format!("Gemini API error ({}): {}", status, body),
                PROVIDER,
            )
            .into());
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, PROVIDER))?;

        let (text, usage) = self.extract_text(body)?;
        debug!("Received {} chars from Gemini", text.len());

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
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        let config = LlmConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        GeminiProvider::new(&config).unwrap()
    }

    fn decode(raw: &str) -> GenerateContentResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_defaults_and_redaction() {
        let p = provider();
        assert_eq!(p.model, DEFAULT_MODEL);
        assert_eq!(p.api_base, DEFAULT_API_BASE);
        assert!(!format!("{:?}", p).contains("test-key"));
    }

    #[test]
    fn test_request_uses_json_mime_type() {
        let request = provider().build_request("hi", GenerationOptions::json(0.2));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = decode(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}],
                "usageMetadata":{"promptTokenCount":10,"candidatesTokenCount":4}}"#,
        );
        let (text, usage) = provider().extract_text(body).unwrap();
        assert_eq!(text, "{\"a\":1}");
        assert_eq!(usage.total(), 14);
    }

    #[test]
    fn test_prompt_block_reason_reported() {
        let body = decode(r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#);
        match provider().extract_text(body) {
            Err(PilotError::Blocked { provider, reason }) => {
                assert_eq!(provider, "gemini");
                assert_eq!(reason, "SAFETY");
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_response_without_reason() {
        let body = decode(r#"{}"#);
        match provider().extract_text(body) {
            Err(PilotError::Blocked { reason, .. }) => assert_eq!(reason, "Unknown"),
            other => panic!("expected block, got {:?}", other),
        }
    }
}
