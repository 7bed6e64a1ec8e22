//! LLM Provider Abstraction
//!
//! Defines the LlmProvider trait used by the plan requester.
//! Providers return the raw completion text; interpreting it as JSON is the
//! caller's job so that malformed output can be reported with the raw text.
//!
//! Failure contract:
//! - `PilotError::Llm` for transport/service faults (categorised)
//! - `PilotError::Blocked` when the provider refuses on policy grounds
//! - `PilotError::Config` when the provider cannot be constructed

mod gemini;
mod ollama;
mod openai;
mod prompt_utils;
#[cfg(test)]
pub(crate) mod scripted;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use prompt_utils::build_json_instruction_prompt;

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::types::{PilotError, Result};

// =============================================================================
// LLM Response
// =============================================================================

/// Raw completion with usage metrics
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text, exactly as returned by the provider
    pub text: String,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Response timing
    pub timing: ResponseTiming,
}

impl LlmResponse {
    /// Create response with text only (usage unknown)
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
            timing: ResponseTiming::default(),
        }
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

/// Per-call generation settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: f32,
    /// Ask the provider for a JSON-only response when it supports it
    pub json_mode: bool,
}

impl GenerationOptions {
    pub fn json(temperature: f32) -> Self {
        Self {
            temperature,
            json_mode: true,
        }
    }
}

/// Shared LLM provider type
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// Single-shot text generation; no retries are attempted by implementors.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Create a shared provider from configuration.
///
/// Fails with `PilotError::Config` when the provider is unknown or lacks
/// credentials; callers treat that as an unconfigured service.
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        _ => Err(PilotError::Config(format!(
            "Unknown provider: {}. Supported: gemini, openai, ollama",
            config.provider
        ))),
    }
}

/// Read an API key from config first, then from the given environment variable
pub(crate) fn resolve_api_key(config: &LlmConfig, env_var: &str) -> Option<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|key| !key.trim().is_empty())
}

/// Build the HTTP client shared by all REST providers
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PilotError::LlmApi(format!("Failed to create HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_unknown() {
        let config = LlmConfig {
            provider: "palm".to_string(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(matches!(err, PilotError::Config(_)));
    }

    #[test]
    fn test_create_ollama_needs_no_key() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let config = LlmConfig {
            api_key: Some("from-config".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_api_key(&config, "STATPILOT_TEST_UNSET_KEY").as_deref(),
            Some("from-config")
        );

        let blank = LlmConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(resolve_api_key(&blank, "STATPILOT_TEST_UNSET_KEY").is_none());
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total(), 150);
    }
}
