//! Start Command
//!
//! Stage 0: store the dataset, profile completeness and ask for column
//! suggestions.
//!
//! Usage:
//!   statpilot start --file data.csv --query "compare age between study groups"

use std::path::Path;

use super::{print_notices, require_ready};
use crate::cli::render;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, block_on};
use crate::types::Result;
use crate::workflow::WorkflowSession;

pub fn run(file: &Path, query: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();
    let workflow = ctx.workflow();

    let report = block_on(workflow.start(file, query))?;
    print_notices(&output, &report);
    let session = require_ready(&report)?;

    render::confirmation_view(&output, session);
    next_steps(&output, session);
    Ok(())
}

pub(crate) fn next_steps(output: &Output, session: &WorkflowSession) {
    output.section("Next");
    output.info(&format!("Session {}", session.id));
    let suggested = session
        .assessment
        .as_ref()
        .and_then(|a| a.suggestion())
        .map(|s| s.suggested_columns.join(","))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "<col1>,<col2>".to_string());
    output.hint(&format!(
        "statpilot confirm --columns {} [--clarify \"answers to the questions\"]",
        suggested
    ));
}
