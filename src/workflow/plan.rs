//! Analysis plan steps decoded from the plan service's JSON.

use serde_json::Value;

use crate::ai::json_type_name;

/// One decoded plan step.
///
/// Required fields are kept optional here so the executor can report a
/// configuration error for the step instead of rejecting the whole plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    TTest {
        variable: Option<String>,
        grouping_variable: Option<String>,
    },
    ChiSquare {
        variable1: Option<String>,
        variable2: Option<String>,
    },
    Descriptive {
        variable: Option<String>,
    },
    /// The planner declared that part of the request cannot be served
    DeclaredError {
        message: Option<String>,
    },
    Unknown {
        analysis_type: String,
    },
    /// Mapping without a usable `analysis_type`
    MissingType,
    /// Not a mapping at all
    Malformed {
        found: &'static str,
    },
}

impl PlanStep {
    pub fn parse(raw: &Value) -> Self {
        let Some(map) = raw.as_object() else {
            return Self::Malformed {
                found: json_type_name(raw),
            };
        };

        let analysis_type = match map.get("analysis_type") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => return Self::MissingType,
            Some(Value::String(s)) if s.is_empty() => return Self::MissingType,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let field = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match analysis_type.as_str() {
            "t-test" => Self::TTest {
                variable: field("variable"),
                grouping_variable: field("grouping_variable"),
            },
            "chi-square" => Self::ChiSquare {
                variable1: field("variable1"),
                variable2: field("variable2"),
            },
            "descriptive_stats" => Self::Descriptive {
                variable: field("variable"),
            },
            "error" => Self::DeclaredError {
                message: field("message"),
            },
            _ => Self::Unknown { analysis_type },
        }
    }

    /// Discriminator as written in the plan, for logs and notices
    pub fn type_label(&self) -> &str {
        match self {
            Self::TTest { .. } => "t-test",
            Self::ChiSquare { .. } => "chi-square",
            Self::Descriptive { .. } => "descriptive_stats",
            Self::DeclaredError { .. } => "error",
            Self::Unknown { analysis_type } => analysis_type,
            Self::MissingType | Self::Malformed { .. } => "N/A",
        }
    }
}

/// One-line description of a raw step for listings
pub fn describe_step(raw: &Value) -> String {
    match PlanStep::parse(raw) {
        PlanStep::TTest {
            variable,
            grouping_variable,
        } => format!(
            "t-test: '{}' by '{}'",
            variable.as_deref().unwrap_or("?"),
            grouping_variable.as_deref().unwrap_or("?")
        ),
        PlanStep::ChiSquare {
            variable1,
            variable2,
        } => format!(
            "chi-square: '{}' vs '{}'",
            variable1.as_deref().unwrap_or("?"),
            variable2.as_deref().unwrap_or("?")
        ),
        PlanStep::Descriptive { variable } => format!(
            "descriptive statistics: '{}'",
            variable.as_deref().unwrap_or("?")
        ),
        PlanStep::DeclaredError { message } => format!(
            "cannot be analysed: {}",
            message.as_deref().unwrap_or("no reason given")
        ),
        PlanStep::Unknown { analysis_type } => format!("unknown analysis '{}'", analysis_type),
        PlanStep::MissingType => "step without an analysis type".to_string(),
        PlanStep::Malformed { found } => format!("malformed step ({})", found),
    }
}
