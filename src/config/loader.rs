//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/statpilot/config.toml)
//! 3. Project config (.statpilot/config.toml)
//! 4. Environment variables (STATPILOT_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{PilotError, Result};

const ENV_PREFIX: &str = "STATPILOT_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut layers = Vec::new();

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            layers.push(global_path);
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            layers.push(project_path);
        }

        Self::load_layers(&layers)
    }

    /// Merge defaults, then each file in order, then the environment
    fn load_layers(files: &[PathBuf]) -> Result<Config> {
        let figment = files
            .iter()
            .fold(Figment::new().merge(Serialized::defaults(Config::default())), |f, path| {
                f.merge(Toml::file(path))
            })
            .merge(Self::env_provider());

        let config: Config = figment
            .extract()
            .map_err(|e| PilotError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Environment provider: the first `_` after the prefix separates the
    /// section from the key, so STATPILOT_LLM_PLAN_TEMPERATURE maps to
    /// `llm.plan_temperature`.
    fn env_provider() -> Env {
        Env::prefixed(ENV_PREFIX).map(|key| key.as_str().replacen('_', ".", 1).into())
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/statpilot/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("statpilot"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".statpilot")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration in the requested format
    pub fn render_config(config: &Config, format: &str) -> Result<String> {
        match format {
            "json" => Ok(serde_json::to_string_pretty(config)?),
            "yaml" => Ok(serde_yaml::to_string(config)?),
            "toml" => {
                toml::to_string_pretty(config).map_err(|e| PilotError::Config(e.to_string()))
            }
            other => Err(PilotError::Config(format!(
                "Unknown format: {}. Supported: toml, json, yaml",
                other
            ))),
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            PilotError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        Self::write_default(&config_path, force)?;
        Ok(config_path)
    }

    /// Initialize project configuration
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir();
        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(project_dir.join("uploads"))?;

        let config_path = Self::project_config_path();
        Self::write_default(&config_path, force)?;
        Ok(config_path)
    }

    fn write_default(path: &Path, force: bool) -> Result<()> {
        if !path.exists() || force {
            fs::write(path, Self::default_config_template())?;
            info!("Created config: {}", path.display());
        } else {
            info!("Config exists: {}", path.display());
        }
        Ok(())
    }

    /// Default config content (TOML)
    fn default_config_template() -> String {
        r#"# statpilot configuration
# Project settings in .statpilot/config.toml override the global file.

version = "1.0"

[llm]
provider = "gemini"
# model = "gemini-1.5-flash"
timeout_secs = 120
temperature = 0.2
plan_temperature = 0.1
max_tokens = 4096
# API keys are read from GEMINI_API_KEY / OPENAI_API_KEY

[workflow]
upload_dir = ".statpilot/uploads"
max_upload_bytes = 16777216
skip_descriptor_row = true
significance_level = 0.05

[storage]
database_path = ".statpilot/sessions.db"
"#
        .to_string()
    }
}
