//! Execute Command
//!
//! Stage 2: run the confirmed plan against the dataset and show the results.

use std::path::Path;

use super::require_ready;
use crate::cli::render;
use crate::cli::report::write_report;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, block_on};
use crate::types::Result;
use crate::workflow::WorkflowState;

pub fn run(session: Option<&str>, report_path: Option<&Path>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();
    let workflow = ctx.workflow();

    let report = block_on(workflow.execute(session))??;
    if let Some(session) = report.session()
        && session.state == WorkflowState::Completed
    {
        if let Some(run) = &session.results {
            render::results(&output, run);
        }
        output.notices(&report.notices);
        if let Some(path) = report_path {
            write_report(session, path)?;
            output.success(&format!("Report written to {}", path.display()));
        }
        return Ok(());
    }

    output.notices(&report.notices);
    super::confirm::present(&output, require_ready(&report)?);
    Ok(())
}
