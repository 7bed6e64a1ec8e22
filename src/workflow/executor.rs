//! Plan execution.
//!
//! Steps run in order and each produces exactly one [`StepResult`]. A bad
//! step (malformed, misconfigured, failing routine, even a panic) only
//! affects its own result.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, warn};

use super::plan::PlanStep;
use crate::data::Dataset;
use crate::stats::{self, ResultBundle, RoutineResult};
use crate::types::{Notice, NoticeLevel, panic_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Success,
    Error,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// The step exactly as the plan stated it
    pub plan: Value,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultBundle>,
}

impl StepResult {
    fn pending(plan: &Value) -> Self {
        Self {
            plan: plan.clone(),
            status: StepStatus::Pending,
            message: None,
            result: None,
        }
    }

    fn finish(mut self, status: StepStatus, message: Option<String>, result: Option<ResultBundle>) -> Self {
        self.status = status;
        self.message = message;
        self.result = result;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub errored: usize,
    pub skipped: usize,
    pub level: NoticeLevel,
    pub message: String,
}

impl ExecutionSummary {
    pub fn from_results(results: &[StepResult]) -> Self {
        let count = |status: StepStatus| results.iter().filter(|r| r.status == status).count();
        let (succeeded, errored, skipped) = (
            count(StepStatus::Success),
            count(StepStatus::Error),
            count(StepStatus::Skipped),
        );

        let mut message = format!(
            "Analysis complete. Total steps {}. Successful: {}.",
            results.len(),
            succeeded
        );
        if errored > 0 {
            message.push_str(&format!(" Errors: {}.", errored));
        }
        if skipped > 0 {
            message.push_str(&format!(" Skipped: {}.", skipped));
        }

        let level = if errored > 0 {
            NoticeLevel::Warning
        } else if skipped > 0 {
            NoticeLevel::Info
        } else {
            NoticeLevel::Success
        };

        Self {
            total: results.len(),
            succeeded,
            errored,
            skipped,
            level,
            message,
        }
    }
}

/// Results of one plan execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRun {
    pub steps: Vec<StepResult>,
    pub summary: ExecutionSummary,
    pub notices: Vec<Notice>,
}

pub struct PlanExecutor<'a> {
    dataset: &'a Dataset,
    alpha: f64,
}

/// Terminal state of one step before it is recorded
struct Finished {
    status: StepStatus,
    message: Option<String>,
    result: Option<ResultBundle>,
}

impl Finished {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Error,
            message: Some(message.into()),
            result: None,
        }
    }

    fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            message: Some(message.into()),
            result: None,
        }
    }
}

impl<'a> PlanExecutor<'a> {
    pub fn new(dataset: &'a Dataset, alpha: f64) -> Self {
        Self { dataset, alpha }
    }

    pub fn execute(&self, steps: &[Value]) -> ExecutionRun {
        info!("Executing {} plan steps", steps.len());
        let mut notices = Vec::new();
        let results: Vec<StepResult> = steps
            .iter()
            .map(|raw| self.execute_step(raw, &mut notices))
            .collect();

        let summary = ExecutionSummary::from_results(&results);
        info!("{}", summary.message);
        notices.push(Notice::new(summary.level, summary.message.clone()));

        ExecutionRun {
            steps: results,
            summary,
            notices,
        }
    }

    fn execute_step(&self, raw: &Value, notices: &mut Vec<Notice>) -> StepResult {
        let pending = StepResult::pending(raw);
        let step = PlanStep::parse(raw);

        let mut step_notices = Vec::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&step, &mut step_notices)));
        notices.append(&mut step_notices);

        let finished = outcome.unwrap_or_else(|payload| {
            let reason = panic_message(payload.as_ref());
            error!("Step {} panicked: {}", raw, reason);
            notices.push(Notice::danger(format!(
                "Error while executing step ({}): {}",
                step.type_label(),
                reason
            )));
            Finished::error(format!("Internal error while executing the step: {}", reason))
        });

        pending.finish(finished.status, finished.message, finished.result)
    }

    fn dispatch(&self, step: &PlanStep, notices: &mut Vec<Notice>) -> Finished {
        match step {
            PlanStep::Malformed { found } => {
                let message = format!("Malformed plan step: expected an object, got {}.", found);
                warn!("Skipping step: {}", message);
                Finished::error(message)
            }
            PlanStep::MissingType => {
                let message = "No analysis type specified in the step.";
                warn!("Skipping step: {}", message);
                Finished::error(message)
            }
            PlanStep::DeclaredError { message } => {
                let message = message
                    .clone()
                    .unwrap_or_else(|| "Step marked as error in plan".to_string());
                notices.push(Notice::info(format!(
                    "Skipped plan step (declared by the planner): {}",
                    message
                )));
                Finished::skipped(message)
            }
            PlanStep::Unknown { analysis_type } => {
                warn!("Skipping step with unknown analysis type: {}", analysis_type);
                notices.push(Notice::info(format!(
                    "Skipped step: unknown analysis type '{}'",
                    analysis_type
                )));
                Finished::skipped(format!("Unknown analysis type '{}' in plan.", analysis_type))
            }
            PlanStep::TTest {
                variable: Some(variable),
                grouping_variable: Some(grouping),
            } => {
                info!("Executing step: t-test {} by {}", variable, grouping);
                let label = format!("t-test ({} by {})", variable, grouping);
                match stats::ttest::check_preconditions(self.dataset, variable, grouping) {
                    Err(message) => validation_error("t-test", message, notices),
                    Ok(_) => routine_outcome(
                        &label,
                        stats::welch_t_test(self.dataset, variable, grouping, self.alpha),
                        notices,
                    ),
                }
            }
            PlanStep::TTest { .. } => config_error(
                "t-test",
                "'variable' or 'grouping_variable' not specified for t-test",
                notices,
            ),
            PlanStep::ChiSquare {
                variable1: Some(first),
                variable2: Some(second),
            } => {
                info!("Executing step: chi-square {} vs {}", first, second);
                let label = format!("chi-square ({} vs {})", first, second);
                match stats::chisquare::check_preconditions(self.dataset, first, second) {
                    Err(message) => validation_error("chi-square", message, notices),
                    Ok(()) => routine_outcome(
                        &label,
                        stats::chi_square(self.dataset, first, second, self.alpha),
                        notices,
                    ),
                }
            }
            PlanStep::ChiSquare { .. } => config_error(
                "chi-square",
                "'variable1' or 'variable2' not specified for chi-square",
                notices,
            ),
            PlanStep::Descriptive {
                variable: Some(variable),
            } => {
                info!("Executing step: descriptive statistics for {}", variable);
                if !self.dataset.has_column(variable) {
                    return validation_error(
                        "descriptive statistics",
                        format!("Column '{}' not found.", variable),
                        notices,
                    );
                }
                routine_outcome(
                    &format!("descriptive statistics ({})", variable),
                    stats::descriptive_stats(self.dataset, variable),
                    notices,
                )
            }
            PlanStep::Descriptive { variable: None } => config_error(
                "descriptive statistics",
                "'variable' not specified for descriptive statistics",
                notices,
            ),
        }
    }
}

fn config_error(kind: &str, message: &str, notices: &mut Vec<Notice>) -> Finished {
    warn!("{} configuration error: {}", kind, message);
    notices.push(Notice::warning(format!("{} configuration error: {}", kind, message)));
    Finished::error(message)
}

fn validation_error(kind: &str, message: String, notices: &mut Vec<Notice>) -> Finished {
    warn!("{} validation error: {}", kind, message);
    notices.push(Notice::danger(format!("{} validation error: {}", kind, message)));
    Finished::error(message)
}

fn routine_outcome(label: &str, result: RoutineResult, notices: &mut Vec<Notice>) -> Finished {
    match result {
        Ok(bundle) => {
            if let Some(warning) = &bundle.warning {
                notices.push(Notice::warning(format!("Warning for {}: {}", label, warning)));
            }
            Finished {
                status: StepStatus::Success,
                message: None,
                result: Some(bundle),
            }
        }
        Err(err) => {
            warn!("{} failed: {}", label, err);
            notices.push(Notice::danger(format!("Error in {}: {}", label, err)));
            Finished {
                status: StepStatus::Error,
                message: Some(err.message),
                result: err.partial,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        let rows: Vec<Vec<Option<String>>> = [
            ["34", "A", "M", "yes", "x", "a"],
            ["41", "B", "F", "no", "y", "b"],
            ["29", "A", "F", "yes", "z", "c"],
            ["", "B", "M", "no", "x", "d"],
            ["50", "A", "M", "yes", "y", "e"],
            ["38", "B", "F", "no", "z", "f"],
        ]
        .iter()
        .map(|row| {
            row.iter()
                .map(|c| (!c.is_empty()).then(|| c.to_string()))
                .collect()
        })
        .collect();
        Dataset::from_rows(
            ["Age", "Group", "Sex", "Answer", "Site", "Code"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows,
        )
        .unwrap()
    }

    fn run(steps: Vec<Value>) -> ExecutionRun {
        let data = dataset();
        PlanExecutor::new(&data, 0.05).execute(&steps)
    }

    #[test]
    fn test_descriptive_step_succeeds() {
        let ages = ["34", "41", "29", "", "50"];
        let data = Dataset::from_rows(
            vec!["Age".into()],
            ages.iter()
                .map(|a| vec![(!a.is_empty()).then(|| a.to_string())])
                .collect(),
        )
        .unwrap();
        let run = PlanExecutor::new(&data, 0.05)
            .execute(&[json!({"analysis_type": "descriptive_stats", "variable": "Age"})]);

        let step = &run.steps[0];
        assert_eq!(step.status, StepStatus::Success);
        let bundle = step.result.as_ref().unwrap();
        assert_eq!(bundle.metric("Valid count"), Some("4"));
        assert!(bundle.warning.is_none());
        assert_eq!(run.summary.level, NoticeLevel::Success);
        assert!(!run.notices.iter().any(|n| n.level == NoticeLevel::Warning));
    }

    #[test]
    fn test_t_test_happy_path() {
        let run = run(vec![json!({"analysis_type": "t-test", "variable": "Age", "grouping_variable": "Group"})]);
        let step = &run.steps[0];
        assert_eq!(step.status, StepStatus::Success);
        let bundle = step.result.as_ref().unwrap();
        assert!(bundle.significant.is_some());
        let p = bundle.metric("p-value").unwrap();
        assert!(p == "< 0.001" || (p.len() == 5 && p.starts_with("0.")), "{p}");
    }

    #[test]
    fn test_t_test_three_groups() {
        let run = run(vec![json!({"analysis_type": "t-test", "variable": "Age", "grouping_variable": "Site"})]);
        let step = &run.steps[0];
        assert_eq!(step.status, StepStatus::Error);
        assert!(step.message.as_ref().unwrap().contains("found 3"));
        assert!(step.result.is_none());
    }

    #[test]
    fn test_t_test_non_numeric_reported_before_group_count() {
        let run = run(vec![json!({"analysis_type": "t-test", "variable": "Code", "grouping_variable": "Site"})]);
        assert_eq!(
            run.steps[0].message.as_deref(),
            Some("Column 'Code' is not numeric.")
        );
    }

    #[test]
    fn test_missing_fields_are_errors_without_bundle() {
        let run = run(vec![
            json!({"analysis_type": "t-test", "variable": "Age"}),
            json!({"analysis_type": "chi-square", "variable2": "Sex"}),
            json!({"analysis_type": "descriptive_stats"}),
        ]);
        for step in &run.steps {
            assert_eq!(step.status, StepStatus::Error);
            assert!(step.result.is_none());
        }
        assert_eq!(
            run.steps[0].message.as_deref(),
            Some("'variable' or 'grouping_variable' not specified for t-test")
        );
        assert_eq!(run.summary.level, NoticeLevel::Warning);
    }

    #[test]
    fn test_chi_square_identical_columns() {
        let run = run(vec![
            json!({"analysis_type": "chi-square", "variable1": "Sex", "variable2": "Sex"}),
            json!({"analysis_type": "chi-square", "variable1": "Ghost", "variable2": "Ghost"}),
        ]);
        assert_eq!(run.steps[0].message.as_deref(), Some("Two different columns required."));
        assert_eq!(run.steps[0].status, StepStatus::Error);
        assert_eq!(run.steps[1].status, StepStatus::Error);
        assert_eq!(run.steps[1].message.as_deref(), Some("Two different columns required."));
    }

    #[test]
    fn test_chi_square_zero_table_is_success_with_warning() {
        let rows = vec![
            vec![Some("M".to_string()), None],
            vec![None, Some("yes".to_string())],
        ];
        let data = Dataset::from_rows(vec!["Sex".into(), "Answer".into()], rows).unwrap();
        let run = PlanExecutor::new(&data, 0.05).execute(&[json!({
            "analysis_type": "chi-square", "variable1": "Sex", "variable2": "Answer"
        })]);

        let step = &run.steps[0];
        assert_eq!(step.status, StepStatus::Success);
        let bundle = step.result.as_ref().unwrap();
        assert!(bundle.warning.is_some());
        assert!(bundle.chart.is_none());
        assert!(run.notices.iter().any(|n| n.level == NoticeLevel::Warning));
    }

    #[test]
    fn test_declared_error_and_unknown_are_skipped() {
        let run = run(vec![
            json!({"analysis_type": "error", "message": "no survival column"}),
            json!({"analysis_type": "error"}),
            json!({"analysis_type": "anova", "variable": "Age"}),
        ]);
        assert!(run.steps.iter().all(|s| s.status == StepStatus::Skipped));
        assert_eq!(run.steps[0].message.as_deref(), Some("no survival column"));
        assert_eq!(run.steps[1].message.as_deref(), Some("Step marked as error in plan"));
        assert_eq!(run.steps[2].message.as_deref(), Some("Unknown analysis type 'anova' in plan."));
        assert_eq!(run.summary.level, NoticeLevel::Info);
        assert_eq!(
            run.summary.message,
            "Analysis complete. Total steps 3. Successful: 0. Skipped: 3."
        );
    }

    #[test]
    fn test_one_element_error_plan() {
        let run = run(vec![json!({"error": "expected a list of steps, got string", "raw_response": "\"oops\""})]);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].status, StepStatus::Error);
        assert_eq!(
            run.steps[0].message.as_deref(),
            Some("No analysis type specified in the step.")
        );
    }

    #[test]
    fn test_malformed_step() {
        let run = run(vec![json!("oops"), json!({"analysis_type": "descriptive_stats", "variable": "Sex"})]);
        assert_eq!(run.steps[0].status, StepStatus::Error);
        assert_eq!(
            run.steps[0].message.as_deref(),
            Some("Malformed plan step: expected an object, got string.")
        );
        assert_eq!(run.steps[1].status, StepStatus::Success);
        assert_eq!(
            run.summary.message,
            "Analysis complete. Total steps 2. Successful: 1. Errors: 1."
        );
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let steps = vec![
            json!({"analysis_type": "t-test", "variable": "Age", "grouping_variable": "Group"}),
            json!({"analysis_type": "chi-square", "variable1": "Sex", "variable2": "Answer"}),
        ];
        let first = run(steps.clone());
        let second = run(steps);
        for (a, b) in first.steps.iter().zip(&second.steps) {
            let (a, b) = (a.result.as_ref().unwrap(), b.result.as_ref().unwrap());
            assert_eq!(a.significant, b.significant);
            assert_eq!(a.metric("p-value"), b.metric("p-value"));
        }
    }

    fn any_step() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(json!({"analysis_type": "descriptive_stats", "variable": "Sex"})),
            Just(json!({"analysis_type": "t-test", "variable": "Age", "grouping_variable": "Group"})),
            Just(json!({"analysis_type": "chi-square", "variable1": "Sex", "variable2": "Sex"})),
            Just(json!({"analysis_type": "error"})),
            Just(json!("oops")),
            Just(json!(42)),
            "[a-z]{1,8}".prop_map(|t| json!({"analysis_type": format!("x-{t}")})),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_results_match_plan_order(steps in prop::collection::vec(any_step(), 0..8)) {
            let run = run(steps.clone());
            prop_assert_eq!(run.steps.len(), steps.len());
            for (result, step) in run.steps.iter().zip(&steps) {
                prop_assert_eq!(&result.plan, step);
                prop_assert_ne!(result.status, StepStatus::Pending);
                if let Some(kind) = step.get("analysis_type").and_then(Value::as_str) {
                    if kind.starts_with("x-") {
                        prop_assert_eq!(result.status, StepStatus::Skipped);
                    }
                }
            }
            prop_assert_eq!(
                run.summary.succeeded + run.summary.errored + run.summary.skipped,
                steps.len()
            );
        }
    }
}
