//! Subcommand handlers

pub mod clean;
pub mod config;
pub mod confirm;
pub mod execute;
pub mod restart;
pub mod run;
pub mod start;
pub mod status;

use crate::cli::ui::Output;
use crate::types::{PilotError, Result};
use crate::workflow::{StageReport, WorkflowSession};

/// A reset means the command failed; its notices already say why
pub(crate) fn require_ready(report: &StageReport) -> Result<&WorkflowSession> {
    report.session().ok_or_else(|| {
        PilotError::Session(
            "The workflow was reset. Start a new analysis with 'statpilot start'.".to_string(),
        )
    })
}

pub(crate) fn print_notices(output: &Output, report: &StageReport) {
    output.notices(&report.notices);
}
