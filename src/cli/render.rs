//! Terminal rendering of workflow views

use console::style;

use super::ui::Output;
use crate::data::CompletenessReport;
use crate::stats::{ResultBundle, Table};
use crate::workflow::{
    AssessmentOutcome, ExecutionRun, PlanOutcome, StepStatus, WorkflowSession, describe_step,
};

/// Plain-text table with padded columns
pub fn format_table(table: &Table) -> String {
    let widths = table.column_widths();
    let line = |cells: &[String]| {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = width)
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    if let Some(title) = &table.title {
        out.push_str(title);
        out.push('\n');
    }
    out.push_str(&line(&table.headers));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.push('\n');
    for row in &table.rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

/// Report rows for eligible columns, percentages to 2 decimals
pub fn completeness_table(report: &CompletenessReport) -> Table {
    let mut table = Table::new(["Column", "Missing", "Missing %"]);
    for row in report.visible_rows() {
        table.push_row([
            row.name.clone(),
            row.missing_count.to_string(),
            format!("{:.2}", row.missing_percent),
        ]);
    }
    table
}

pub fn completeness(output: &Output, report: &CompletenessReport) {
    output.section(&format!("Data completeness ({} rows)", report.row_count));
    let table = completeness_table(report);
    if table.is_empty() {
        output.warning("No usable columns.");
    } else {
        print!("{}", format_table(&table));
    }
    output.hint(&report.summary);
}

pub fn assessment(output: &Output, outcome: &AssessmentOutcome) {
    output.section("Suggested columns");
    match outcome.suggestion() {
        Some(suggestion) => {
            if suggestion.suggested_columns.is_empty() {
                output.info("No columns were suggested.");
            }
            for column in &suggestion.suggested_columns {
                println!("  • {}", column);
            }
            if !suggestion.questions_to_user.is_empty() {
                output.section("Clarifying questions");
                for (i, question) in suggestion.questions_to_user.iter().enumerate() {
                    println!("  {}. {}", i + 1, question);
                }
            }
        }
        None => output.warning(&outcome.error_message().unwrap_or_default()),
    }
}

/// Column confirmation view
pub fn confirmation_view(output: &Output, session: &WorkflowSession) {
    if let Some(query) = &session.query {
        output.header(&format!("Request: {}", query));
    }
    if let Some(report) = &session.completeness {
        completeness(output, report);
    }
    if let Some(outcome) = &session.assessment {
        assessment(output, outcome);
    }
    if let Some(eligible) = &session.eligible_columns {
        output.section("Available columns");
        println!("  {}", eligible.join(", "));
    }
}

pub fn plan(output: &Output, outcome: &PlanOutcome) {
    output.section("Proposed analysis plan");
    match outcome {
        PlanOutcome::Valid { steps } if steps.is_empty() => output.warning("The plan has no steps."),
        PlanOutcome::Valid { steps } => {
            for (i, step) in steps.iter().enumerate() {
                println!("  {}. {}", i + 1, describe_step(step));
            }
        }
        PlanOutcome::ShapeError { raw, .. } => {
            output.error(&outcome.error_message().unwrap_or_default());
            output.hint(&format!("Raw response: {}", raw));
        }
        _ => output.error(&outcome.error_message().unwrap_or_default()),
    }
}

fn status_label(status: StepStatus) -> String {
    match status {
        StepStatus::Success => style("success").green().to_string(),
        StepStatus::Error => style("error").red().to_string(),
        StepStatus::Skipped => style("skipped").yellow().to_string(),
        StepStatus::Pending => style("pending").dim().to_string(),
    }
}

pub fn bundle(output: &Output, bundle: &ResultBundle) {
    println!("  {}", style(&bundle.test_type).bold());
    if let Some(warning) = &bundle.warning {
        output.warning(warning);
    }
    for metric in &bundle.metrics {
        println!("    {:<22} {}", metric.label, metric.value);
    }
    for table in &bundle.tables {
        println!();
        for line in format_table(table).lines() {
            println!("    {}", line);
        }
    }
    if let Some(interpretation) = &bundle.interpretation {
        println!();
        println!("  {}", style(interpretation).italic());
    }
    if bundle.chart.is_some() {
        output.hint("Chart available in the Markdown report (--report).");
    }
}

pub fn results(output: &Output, run: &ExecutionRun) {
    output.header("Analysis results");
    for (i, step) in run.steps.iter().enumerate() {
        println!(
            "\n{} {} [{}]",
            style(format!("Step {}:", i + 1)).bold(),
            describe_step(&step.plan),
            status_label(step.status)
        );
        if let Some(message) = &step.message {
            println!("  {}", message);
        }
        if let Some(result) = &step.result {
            bundle(output, result);
        }
    }
    println!();
}
