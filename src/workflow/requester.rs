//! Two-call protocol with the assessment/plan service.
//!
//! Every failure is folded into an outcome value at this boundary: service
//! faults, content blocking and malformed output are distinct variants and
//! nothing is propagated as an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::prompts::{assessment_prompt, plan_prompt};
use crate::ai::{GenerationOptions, SharedProvider, extract_json, json_type_name};
use crate::config::LlmConfig;
use crate::constants::llm::LOG_PREVIEW_CHARS;
use crate::types::PilotError;

/// Columns and questions proposed by the assessment call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggested_columns: Vec<String>,
    pub questions_to_user: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssessmentOutcome {
    Valid(Suggestion),
    ServiceError { message: String },
    Blocked { reason: String },
    ShapeError { message: String, raw: String },
}

impl AssessmentOutcome {
    pub fn suggestion(&self) -> Option<&Suggestion> {
        match self {
            Self::Valid(suggestion) => Some(suggestion),
            _ => None,
        }
    }

    /// User-facing description of a failed call
    pub fn error_message(&self) -> Option<String> {
        failure_message(match self {
            Self::Valid(_) => return None,
            Self::ServiceError { message } => Failure::Service(message),
            Self::Blocked { reason } => Failure::Blocked(reason),
            Self::ShapeError { message, .. } => Failure::Shape(message),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanOutcome {
    Valid { steps: Vec<Value> },
    ServiceError { message: String },
    Blocked { reason: String },
    ShapeError { message: String, raw: String },
}

impl PlanOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn error_message(&self) -> Option<String> {
        failure_message(match self {
            Self::Valid { .. } => return None,
            Self::ServiceError { message } => Failure::Service(message),
            Self::Blocked { reason } => Failure::Blocked(reason),
            Self::ShapeError { message, .. } => Failure::Shape(message),
        })
    }

    /// Uniform executor input: the steps of a valid plan, or a one-element
    /// error plan describing why there are none
    pub fn to_steps(&self) -> Vec<Value> {
        match self {
            Self::Valid { steps } => steps.clone(),
            Self::ShapeError { raw, .. } => vec![serde_json::json!({
                "error": self.error_message().unwrap_or_default(),
                "raw_response": raw,
            })],
            _ => vec![serde_json::json!({ "error": self.error_message().unwrap_or_default() })],
        }
    }
}

enum Failure<'a> {
    Service(&'a str),
    Blocked(&'a str),
    Shape(&'a str),
}

fn failure_message(failure: Failure<'_>) -> Option<String> {
    Some(match failure {
        Failure::Service(message) => format!("Assessment service error: {}", message),
        Failure::Blocked(reason) => format!("Request blocked by the assessment service: {}", reason),
        Failure::Shape(message) => format!("The assessment service returned an unexpected format: {}", message),
    })
}

/// Non-success raw call result shared by both calls
enum CallFailure {
    Service(String),
    Blocked(String),
}

/// Client for the assessment and plan calls
pub struct PlanRequester {
    provider: SharedProvider,
    assessment_temperature: f32,
    plan_temperature: f32,
}

impl PlanRequester {
    pub fn new(provider: SharedProvider, config: &LlmConfig) -> Self {
        Self {
            provider,
            assessment_temperature: config.temperature,
            plan_temperature: config.plan_temperature,
        }
    }

    /// Stage 0: column suggestions and clarifying questions
    pub async fn assess(&self, query: &str, eligible_columns: &[String], missing_summary: &str) -> AssessmentOutcome {
        let prompt = assessment_prompt(query, eligible_columns, missing_summary);
        info!(
            "Requesting column assessment from {} ({} columns)",
            self.provider.name(),
            eligible_columns.len()
        );

        let raw = match self.call(&prompt, self.assessment_temperature).await {
            Ok(raw) => raw,
            Err(CallFailure::Service(message)) => return AssessmentOutcome::ServiceError { message },
            Err(CallFailure::Blocked(reason)) => return AssessmentOutcome::Blocked { reason },
        };

        match decode_suggestion(&raw) {
            Ok(suggestion) => {
                info!(
                    "Assessment suggested {} columns and {} questions",
                    suggestion.suggested_columns.len(),
                    suggestion.questions_to_user.len()
                );
                AssessmentOutcome::Valid(suggestion)
            }
            Err(message) => {
                warn!("Assessment response rejected: {}", message);
                AssessmentOutcome::ShapeError { message, raw }
            }
        }
    }

    /// Stage 1: detailed analysis plan
    pub async fn plan(&self, query: &str, confirmed_columns: &[String], clarification: Option<&str>) -> PlanOutcome {
        let prompt = plan_prompt(query, confirmed_columns, clarification);
        info!(
            "Requesting analysis plan from {} ({} confirmed columns)",
            self.provider.name(),
            confirmed_columns.len()
        );

        let raw = match self.call(&prompt, self.plan_temperature).await {
            Ok(raw) => raw,
            Err(CallFailure::Service(message)) => return PlanOutcome::ServiceError { message },
            Err(CallFailure::Blocked(reason)) => return PlanOutcome::Blocked { reason },
        };

        match decode_plan(&raw) {
            Ok(steps) => {
                info!("Plan received with {} steps", steps.len());
                PlanOutcome::Valid { steps }
            }
            Err(message) => {
                warn!("Plan response rejected: {}", message);
                PlanOutcome::ShapeError { message, raw }
            }
        }
    }

    async fn call(&self, prompt: &str, temperature: f32) -> std::result::Result<String, CallFailure> {
        match self.provider.generate(prompt, GenerationOptions::json(temperature)).await {
            Ok(response) => {
                debug!(
                    "{} answered in {} ms ({} tokens)",
                    self.provider.name(),
                    response.timing.total_ms,
                    response.usage.total()
                );
                debug!("Raw response: {}", preview(&response.text));
                Ok(response.text)
            }
            Err(PilotError::Blocked { provider, reason }) => {
                warn!("{} blocked the request: {}", provider, reason);
                Err(CallFailure::Blocked(reason))
            }
            Err(e) => {
                warn!("Service call failed: {}", e);
                Err(CallFailure::Service(match e {
                    PilotError::Llm(err) if err.category.is_connectivity() => format!(
                        "{} (check the network connection and the provider endpoint)",
                        err.message
                    ),
                    PilotError::Llm(err) => err.message,
                    other => other.to_string(),
                }))
            }
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    format!("{}... ({} chars)", head, text.chars().count())
}

/// Strict decode: an object with exactly `suggested_columns` and
/// `questions_to_user`, both lists of strings
pub fn decode_suggestion(raw: &str) -> std::result::Result<Suggestion, String> {
    let value = extract_json(raw).map_err(|e| format!("invalid JSON: {}", e))?;
    let Value::Object(map) = &value else {
        return Err(format!("expected an object, got {}", json_type_name(&value)));
    };

    if let Some(extra) = map
        .keys()
        .find(|k| *k != "suggested_columns" && *k != "questions_to_user")
    {
        return Err(format!("unexpected field '{}'", extra));
    }

    let strings = |key: &str| -> std::result::Result<Vec<String>, String> {
        let field = map.get(key).ok_or_else(|| format!("missing field '{}'", key))?;
        let Value::Array(items) = field else {
            return Err(format!("'{}' must be a list, got {}", key, json_type_name(field)));
        };
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    format!("'{}' must contain only strings, found {}", key, json_type_name(item))
                })
            })
            .collect()
    };

    Ok(Suggestion {
        suggested_columns: strings("suggested_columns")?,
        questions_to_user: strings("questions_to_user")?,
    })
}

/// Top level must be a list; individual steps are judged by the executor
pub fn decode_plan(raw: &str) -> std::result::Result<Vec<Value>, String> {
    match extract_json(raw).map_err(|e| format!("invalid JSON: {}", e))? {
        Value::Array(steps) => Ok(steps),
        other => Err(format!("expected a list of steps, got {}", json_type_name(&other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::scripted::{Scripted, ScriptedProvider};
    use crate::types::ErrorCategory;
    use std::sync::Arc;

    fn requester(replies: Vec<Scripted>) -> (PlanRequester, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(replies));
        (
            PlanRequester::new(provider.clone(), &LlmConfig::default()),
            provider,
        )
    }

    fn columns() -> Vec<String> {
        vec!["Age".to_string(), "Group".to_string()]
    }

    #[tokio::test]
    async fn test_assessment_valid() {
        let (requester, provider) = requester(vec![Scripted::Text(
            r#"{"suggested_columns": ["Age"], "questions_to_user": []}"#.into(),
        )]);
        let outcome = requester.assess("age by group", &columns(), "none").await;

        assert_eq!(
            outcome,
            AssessmentOutcome::Valid(Suggestion {
                suggested_columns: vec!["Age".into()],
                questions_to_user: vec![],
            })
        );
        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].1, GenerationOptions::json(0.2));
    }

    #[tokio::test]
    async fn test_assessment_fenced_json_accepted() {
        let (requester, _) = requester(vec![Scripted::Text(
            "```json\n{\"suggested_columns\": [], \"questions_to_user\": [\"Which group?\"]}\n```".into(),
        )]);
        let outcome = requester.assess("q", &columns(), "").await;
        assert_eq!(outcome.suggestion().unwrap().questions_to_user, vec!["Which group?"]);
    }

    #[tokio::test]
    async fn test_assessment_failure_modes() {
        let (requester, _) = requester(vec![
            Scripted::Fail(ErrorCategory::Network, "connection refused".into()),
            Scripted::Blocked("SAFETY".into()),
            Scripted::Text("not json".into()),
            Scripted::Text(r#"{"suggested_columns": "Age", "questions_to_user": []}"#.into()),
        ]);

        assert_eq!(
            requester.assess("q", &columns(), "").await,
            AssessmentOutcome::ServiceError {
                message: "connection refused (check the network connection and the provider endpoint)"
                    .into()
            }
        );
        assert_eq!(
            requester.assess("q", &columns(), "").await,
            AssessmentOutcome::Blocked {
                reason: "SAFETY".into()
            }
        );
        match requester.assess("q", &columns(), "").await {
            AssessmentOutcome::ShapeError { message, raw } => {
                assert!(message.starts_with("invalid JSON"));
                assert_eq!(raw, "not json");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match requester.assess("q", &columns(), "").await {
            AssessmentOutcome::ShapeError { message, .. } => {
                assert_eq!(message, "'suggested_columns' must be a list, got string");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_decode_suggestion_is_strict() {
        assert_eq!(
            decode_suggestion(r#"{"suggested_columns": []}"#).unwrap_err(),
            "missing field 'questions_to_user'"
        );
        assert_eq!(
            decode_suggestion(r#"{"suggested_columns": [1], "questions_to_user": []}"#).unwrap_err(),
            "'suggested_columns' must contain only strings, found number"
        );
        assert_eq!(
            decode_suggestion(r#"{"suggested_columns": [], "questions_to_user": [], "note": "x"}"#)
                .unwrap_err(),
            "unexpected field 'note'"
        );
        assert_eq!(
            decode_suggestion("[]").unwrap_err(),
            "expected an object, got list"
        );
    }


    #[tokio::test]
    async fn test_only_unreachable_service_gets_network_hint() {
        let (requester, _) = requester(vec![
            Scripted::Fail(ErrorCategory::Unavailable, "model not found".into()),
            Scripted::Fail(ErrorCategory::Auth, "API key not valid".into()),
        ]);

        match requester.plan("q", &columns(), None).await {
            PlanOutcome::ServiceError { message } => {
                assert!(message.starts_with("model not found ("));
                assert!(message.contains("network connection"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match requester.plan("q", &columns(), None).await {
            PlanOutcome::ServiceError { message } => assert_eq!(message, "API key not valid"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plan_valid_keeps_malformed_steps() {
        let (requester, provider) = requester(vec![Scripted::Text(
            r#"[{"analysis_type": "descriptive_stats", "variable": "Age"}, "oops"]"#.into(),
        )]);
        let outcome = requester.plan("q", &columns(), Some("use Age")).await;

        match outcome {
            PlanOutcome::Valid { steps } => assert_eq!(steps.len(), 2),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(provider.prompts()[0].1, GenerationOptions::json(0.1));
        assert!(provider.prompts()[0].0.contains("use Age"));
    }

    #[tokio::test]
    async fn test_plan_non_list_becomes_one_step_error_plan() {
        let (requester, _) = requester(vec![Scripted::Text("\"oops\"".into())]);
        let outcome = requester.plan("q", &columns(), None).await;

        assert!(!outcome.is_valid());
        assert_eq!(
            outcome.error_message().unwrap(),
            "The assessment service returned an unexpected format: expected a list of steps, got string"
        );
        let steps = outcome.to_steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0]["raw_response"], "\"oops\"");
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(PlanOutcome::Blocked {
            reason: "SAFETY".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "blocked");

        let round: AssessmentOutcome = serde_json::from_value(
            serde_json::to_value(AssessmentOutcome::Valid(Suggestion::default())).unwrap(),
        )
        .unwrap();
        assert!(round.suggestion().is_some());
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(LOG_PREVIEW_CHARS + 10);
        assert!(preview(&long).ends_with(&format!("({} chars)", LOG_PREVIEW_CHARS + 10)));
        assert_eq!(preview("short"), "short");
    }
}
