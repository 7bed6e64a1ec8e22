//! Statistical routines
//!
//! Each routine takes the dataset and column names, and returns a
//! [`ResultBundle`] (formatted metrics, tables, interpretation, optional
//! chart) or a [`RoutineError`]. Routines never panic on data shape; the
//! executor still wraps them in a panic boundary.

pub mod chart;
pub mod chisquare;
pub mod descriptive;
pub mod format;
pub mod table;
pub mod ttest;

pub use chisquare::chi_square;
pub use descriptive::descriptive_stats;
pub use format::format_p_value;
pub use table::Table;
pub use ttest::welch_t_test;

use serde::{Deserialize, Serialize};

/// One labelled, pre-formatted figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
}

impl Metric {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Result of one statistical routine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub test_type: String,
    pub variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significant: Option<bool>,
    /// Non-fatal caveat (no data left, unreliable test)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// `data:image/svg+xml;base64,...`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
}

impl ResultBundle {
    pub fn new(test_type: impl Into<String>, variables: &[&str]) -> Self {
        Self {
            test_type: test_type.into(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Bundle carrying only a warning (nothing could be computed)
    pub fn warning_only(
        test_type: impl Into<String>,
        variables: &[&str],
        warning: impl Into<String>,
    ) -> Self {
        Self {
            warning: Some(warning.into()),
            ..Self::new(test_type, variables)
        }
    }

    pub fn metric(&self, label: &str) -> Option<&str> {
        self.metrics
            .iter()
            .find(|m| m.label == label)
            .map(|m| m.value.as_str())
    }
}

/// Routine failure; `partial` holds whatever was computed before failing
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineError {
    pub message: String,
    pub partial: Option<ResultBundle>,
}

impl RoutineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: None,
        }
    }

    pub fn with_partial(message: impl Into<String>, partial: ResultBundle) -> Self {
        Self {
            message: message.into(),
            partial: Some(partial),
        }
    }
}

impl std::fmt::Display for RoutineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub type RoutineResult = std::result::Result<ResultBundle, RoutineError>;

/// Sample quantile with linear interpolation between order statistics.
/// `sorted` must be ascending and non-empty.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Ascending copy of `values`
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}
