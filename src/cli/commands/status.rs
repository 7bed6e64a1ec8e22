//! Status Command
//!
//! Show the current (or a given) session and the list of stored sessions.

use console::style;

use crate::cli::render;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{PilotError, Result};
use crate::workflow::WorkflowState;

pub fn run(session: Option<&str>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let selected = ctx.store.resolve(session)?;
    let sessions = ctx.store.list()?;

    if format == "json" {
        let status = serde_json::json!({
            "session": selected,
            "sessions": sessions,
        });
        let json = serde_json::to_string_pretty(&status).map_err(PilotError::Json)?;
        println!("{}", json);
        return Ok(());
    }

    let output = Output::new();
    println!("statpilot status");
    println!("══════════════════════════════════════");

    match &selected {
        None => println!("No active session. Run 'statpilot start' to begin."),
        Some(s) => {
            println!("Session:  {}", s.id);
            println!("State:    {}", s.state);
            if let Some(upload) = &s.upload {
                println!("Dataset:  {} ({} bytes)", upload.original_name, upload.size_bytes);
            }
            if let Some(query) = &s.query {
                println!("Request:  {}", query);
            }
            println!("Updated:  {}", s.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));

            match s.state {
                WorkflowState::AwaitingColumnConfirmation => {
                    if let Some(outcome) = &s.assessment {
                        render::assessment(&output, outcome);
                    }
                }
                WorkflowState::AwaitingPlanConfirmation => {
                    if let Some(plan) = &s.plan {
                        render::plan(&output, plan);
                    }
                }
                WorkflowState::Start | WorkflowState::Completed => {}
            }
        }
    }

    if sessions.len() > 1 || (sessions.len() == 1 && selected.is_none()) {
        output.section("Stored sessions");
        for summary in &sessions {
            let marker = if summary.is_current { "*" } else { " " };
            println!(
                "{} {}  {:<28} {}",
                marker,
                style(&summary.id).dim(),
                summary.state,
                summary.original_name.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}
