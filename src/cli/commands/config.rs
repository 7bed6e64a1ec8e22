//! Config Command
//!
//! Manage statpilot configuration.
//!
//! Usage:
//!   statpilot config show [-f toml|json|yaml]
//!   statpilot config path
//!   statpilot config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(format: &str) -> Result<()> {
    let config = ConfigLoader::load()?;
    println!("{}", ConfigLoader::render_config(&config, format)?);
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let output = Output::new();
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };
    output.success(&format!(
        "Initialized {} configuration",
        if global { "global" } else { "project" }
    ));
    output.hint(&format!("Config: {}", path.display()));
    Ok(())
}
