//! Confirm Command
//!
//! Stage 1: confirm the columns, answer the clarifying questions and get a
//! detailed analysis plan.

use super::{print_notices, require_ready};
use crate::cli::render;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, block_on};
use crate::types::Result;
use crate::workflow::{WorkflowSession, WorkflowState};

pub fn run(session: Option<&str>, columns: &[String], clarification: Option<&str>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();
    let workflow = ctx.workflow();

    let report = block_on(workflow.confirm(session, columns, clarification))??;
    print_notices(&output, &report);
    present(&output, require_ready(&report)?);
    Ok(())
}

/// Either the re-presented column view or the proposed plan
pub(crate) fn present(output: &Output, session: &WorkflowSession) {
    if session.state == WorkflowState::AwaitingColumnConfirmation {
        render::confirmation_view(output, session);
        super::start::next_steps(output, session);
        return;
    }

    if let Some(plan) = &session.plan {
        render::plan(output, plan);
        output.section("Next");
        if plan.is_valid() {
            output.hint("statpilot execute [--report report.md]");
        } else {
            output.hint("statpilot execute   (records the plan error and ends the session)");
            output.hint("statpilot confirm --columns ...   (request a new plan)");
        }
    }
}
