//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/statpilot/) and project (.statpilot/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{llm as llm_defaults, workflow as workflow_defaults};
use crate::types::{PilotError, Result};

/// Providers accepted in `llm.provider`
pub const SUPPORTED_PROVIDERS: &[&str] = &["gemini", "openai", "ollama"];

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Assessment/plan service settings
    pub llm: LlmConfig,

    /// Workflow behaviour (intake, loading, significance)
    pub workflow: WorkflowConfig,

    /// Session store settings
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            workflow: WorkflowConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `PilotError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(PilotError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.llm.provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        for (name, value) in [
            ("temperature", self.llm.temperature),
            ("plan_temperature", self.llm.plan_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(PilotError::Config(format!(
                    "LLM {} must be between 0.0 and 2.0, got {}",
                    name, value
                )));
            }
        }

        if self.llm.timeout_secs == 0 {
            return Err(PilotError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(PilotError::Config(
                "LLM max_tokens must be greater than 0".to_string(),
            ));
        }

        if let Some(base) = &self.llm.api_base {
            let parsed = url::Url::parse(base).map_err(|e| {
                PilotError::Config(format!("Invalid llm.api_base '{}': {}", base, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(PilotError::Config(format!(
                    "llm.api_base must use http or https, got: {}",
                    parsed.scheme()
                )));
            }
        }

        if self.workflow.max_upload_bytes == 0 {
            return Err(PilotError::Config(
                "workflow max_upload_bytes must be greater than 0".to_string(),
            ));
        }

        if !(self.workflow.significance_level > 0.0 && self.workflow.significance_level < 1.0) {
            return Err(PilotError::Config(format!(
                "workflow significance_level must be in (0, 1), got {}",
                self.workflow.significance_level
            )));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "gemini", "openai", "ollama"
    pub provider: String,

    /// Model name (provider default when unset)
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for the column assessment call
    pub temperature: f32,

    /// Temperature for the detailed plan call
    pub plan_temperature: f32,

    /// API base URL override
    pub api_base: Option<String>,

    /// API key. Never serialized; prefer GEMINI_API_KEY / OPENAI_API_KEY.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("plan_temperature", &self.plan_temperature)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: llm_defaults::DEFAULT_PROVIDER.to_string(),
            model: None,
            timeout_secs: llm_defaults::DEFAULT_TIMEOUT_SECS,
            temperature: llm_defaults::ASSESSMENT_TEMPERATURE,
            plan_temperature: llm_defaults::PLAN_TEMPERATURE,
            api_base: None,
            api_key: None,
            max_tokens: llm_defaults::DEFAULT_MAX_TOKENS,
        }
    }
}

// =============================================================================
// Workflow Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Directory holding uploaded datasets (relative to the working directory)
    pub upload_dir: PathBuf,

    /// Maximum accepted dataset size in bytes
    pub max_upload_bytes: u64,

    /// Skip the descriptor row that follows the header
    pub skip_descriptor_row: bool,

    /// Significance threshold for hypothesis tests
    pub significance_level: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(workflow_defaults::UPLOAD_DIR),
            max_upload_bytes: workflow_defaults::MAX_UPLOAD_BYTES,
            skip_descriptor_row: true,
            significance_level: workflow_defaults::SIGNIFICANCE_LEVEL,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite session database path
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(workflow_defaults::DATABASE_PATH),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
