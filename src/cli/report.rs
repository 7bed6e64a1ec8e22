//! Markdown report with embedded charts

use std::fmt::Write as _;
use std::path::Path;

use crate::stats::ResultBundle;
use crate::workflow::{WorkflowSession, describe_step};

pub fn render_markdown(session: &WorkflowSession) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Statistical analysis report\n");

    if let Some(query) = &session.query {
        let _ = writeln!(out, "**Request:** {}\n", query);
    }
    if let Some(upload) = &session.upload {
        let _ = writeln!(
            out,
            "**Dataset:** `{}` (SHA-256 `{}`)\n",
            upload.original_name, upload.sha256
        );
    }
    if !session.confirmed_columns.is_empty() {
        let _ = writeln!(
            out,
            "**Columns:** {}\n",
            session
                .confirmed_columns
                .iter()
                .map(|c| format!("`{}`", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if let Some(clarification) = &session.clarification {
        let _ = writeln!(out, "**Clarification:** {}\n", clarification);
    }
    let _ = writeln!(
        out,
        "_Generated {}_\n",
        session.updated_at.format("%Y-%m-%d %H:%M UTC")
    );

    let Some(run) = &session.results else {
        out.push_str("No results.\n");
        return out;
    };

    let _ = writeln!(out, "> {}\n", run.summary.message);

    for (i, step) in run.steps.iter().enumerate() {
        let _ = writeln!(
            out,
            "## Step {}: {} ({})\n",
            i + 1,
            describe_step(&step.plan),
            step.status
        );
        if let Some(message) = &step.message {
            let _ = writeln!(out, "{}\n", message);
        }
        if let Some(bundle) = &step.result {
            push_bundle(&mut out, bundle);
        }
    }
    out
}

fn push_bundle(out: &mut String, bundle: &ResultBundle) {
    let _ = writeln!(out, "### {}\n", bundle.test_type);
    if let Some(warning) = &bundle.warning {
        let _ = writeln!(out, "> **Warning:** {}\n", warning);
    }
    if !bundle.metrics.is_empty() {
        out.push_str("| Metric | Value |\n|---|---|\n");
        for metric in &bundle.metrics {
            let _ = writeln!(out, "| {} | {} |", metric.label, metric.value);
        }
        out.push('\n');
    }
    for table in &bundle.tables {
        out.push_str(&table.to_markdown());
        out.push('\n');
    }
    if let Some(interpretation) = &bundle.interpretation {
        let _ = writeln!(out, "_{}_\n", interpretation);
    }
    if let Some(chart) = &bundle.chart {
        let _ = writeln!(out, "![{}]({})\n", bundle.test_type, chart);
    }
}

pub fn write_report(session: &WorkflowSession, path: &Path) -> crate::types::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_markdown(session))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::types::SessionId;
    use crate::workflow::{PlanExecutor, WorkflowState};
    use serde_json::json;
    use tempfile::TempDir;

    fn completed_session() -> WorkflowSession {
        let dataset = Dataset::from_rows(
            vec!["Age".into(), "Group".into()],
            [("34", "A"), ("41", "B"), ("29", "A"), ("50", "B"), ("38", "A"), ("45", "B")]
                .iter()
                .map(|(a, g)| vec![Some(a.to_string()), Some(g.to_string())])
                .collect(),
        )
        .unwrap();
        let run = PlanExecutor::new(&dataset, 0.05).execute(&[
            json!({"analysis_type": "descriptive_stats", "variable": "Age"}),
            json!({"analysis_type": "survival"}),
        ]);

        let mut session = WorkflowSession::new(SessionId::new("s"));
        session.query = Some("describe age".into());
        session.confirmed_columns = vec!["Age".into()];
        session.results = Some(run);
        session.advance(WorkflowState::Completed);
        session
    }

    #[test]
    fn test_report_sections() {
        let markdown = render_markdown(&completed_session());
        assert!(markdown.starts_with("# Statistical analysis report"));
        assert!(markdown.contains("**Request:** describe age"));
        assert!(markdown.contains("## Step 1: descriptive statistics: 'Age' (success)"));
        assert!(markdown.contains("| Mean |"));
        assert!(markdown.contains("![Descriptive statistics](data:image/svg+xml;base64,"));
        assert!(markdown.contains("## Step 2: unknown analysis 'survival' (skipped)"));
    }

    #[test]
    fn test_report_without_results() {
        let session = WorkflowSession::new(SessionId::new("s"));
        assert!(render_markdown(&session).ends_with("No results.\n"));
    }

    #[test]
    fn test_write_report_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.md");
        write_report(&completed_session(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("Step 1"));
    }
}
