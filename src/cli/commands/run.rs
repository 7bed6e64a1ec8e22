//! Run Command
//!
//! Guided interactive flow: all three stages in one process, with column
//! confirmation and plan approval read from the terminal.

use console::Term;
use std::path::Path;

use super::{print_notices, require_ready};
use crate::cli::render;
use crate::cli::report::write_report;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, block_on};
use crate::types::Result;
use crate::workflow::{WorkflowSession, WorkflowState};

pub fn run(file: &Path, query: &str, report_path: Option<&Path>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();
    let term = Term::stdout();
    let workflow = ctx.workflow();

    let report = block_on(workflow.start(file, query))?;
    print_notices(&output, &report);
    let mut session = require_ready(&report)?.clone();
    render::confirmation_view(&output, &session);

    // Stage 1, repeated while the selection is rejected
    loop {
        let columns = ask_columns(&term, &output, &session)?;
        let clarification = ask(&term, "Answers to the clarifying questions (optional): ")?;
        let report = block_on(workflow.confirm(
            Some(session.id.as_str()),
            &columns,
            Some(clarification.as_str()),
        ))??;
        print_notices(&output, &report);
        session = require_ready(&report)?.clone();
        if session.state == WorkflowState::AwaitingPlanConfirmation {
            break;
        }
    }

    let Some(plan) = &session.plan else {
        return Ok(());
    };
    render::plan(&output, plan);

    // An invalid plan is recorded as a single error step without asking
    let approved = !plan.is_valid() || {
        let answer = ask(&term, "Run this plan? [Y/n] ")?;
        !matches!(answer.trim().to_lowercase().as_str(), "n" | "no")
    };
    if !approved {
        let report = workflow.restart(Some(session.id.as_str()))?;
        print_notices(&output, &report);
        return Ok(());
    }

    let report = block_on(workflow.execute(Some(session.id.as_str())))??;
    if let Some(done) = report.session()
        && let Some(results) = &done.results
    {
        render::results(&output, results);
        if let Some(path) = report_path {
            write_report(done, path)?;
            output.success(&format!("Report written to {}", path.display()));
        }
    }
    print_notices(&output, &report);
    require_ready(&report).map(|_| ())
}

fn ask(term: &Term, prompt: &str) -> Result<String> {
    term.write_str(prompt)?;
    Ok(term.read_line()?.trim().to_string())
}

/// Comma-separated selection; empty input accepts the suggested columns
fn ask_columns(term: &Term, output: &Output, session: &WorkflowSession) -> Result<Vec<String>> {
    let suggested: Vec<String> = session
        .assessment
        .as_ref()
        .and_then(|a| a.suggestion())
        .map(|s| s.suggested_columns.clone())
        .unwrap_or_default();
    if !suggested.is_empty() {
        output.hint(&format!("Press Enter to use: {}", suggested.join(", ")));
    }

    let answer = ask(term, "Columns to analyse (comma-separated): ")?;
    if answer.is_empty() {
        return Ok(suggested);
    }
    Ok(parse_columns(&answer))
}

pub(crate) fn parse_columns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_columns() {
        assert_eq!(parse_columns(" Age, Group ,,Sex"), vec!["Age", "Group", "Sex"]);
        assert!(parse_columns(" , ").is_empty());
    }
}
