//! Per-run workflow session record and its stage guards

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::executor::ExecutionRun;
use super::requester::{AssessmentOutcome, PlanOutcome};
use crate::data::{CompletenessReport, StoredFile, fingerprint};
use crate::types::{PilotError, Result, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Start,
    AwaitingColumnConfirmation,
    AwaitingPlanConfirmation,
    Completed,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Start => "start",
            Self::AwaitingColumnConfirmation => "awaiting column confirmation",
            Self::AwaitingPlanConfirmation => "awaiting plan confirmation",
            Self::Completed => "completed",
        };
        write!(f, "{}", label)
    }
}

/// Everything one workflow run carries across stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub id: SessionId,
    pub state: WorkflowState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub upload: Option<StoredFile>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub all_columns: Vec<String>,
    #[serde(default)]
    pub eligible_columns: Option<Vec<String>>,
    #[serde(default)]
    pub completeness: Option<CompletenessReport>,
    #[serde(default)]
    pub assessment: Option<AssessmentOutcome>,

    #[serde(default)]
    pub confirmed_columns: Vec<String>,
    #[serde(default)]
    pub clarification: Option<String>,
    #[serde(default)]
    pub plan: Option<PlanOutcome>,

    #[serde(default)]
    pub results: Option<ExecutionRun>,
}

/// Prior-stage state required by stage 1
pub struct ColumnStageInput<'a> {
    pub query: &'a str,
    pub eligible_columns: &'a [String],
    pub upload: &'a StoredFile,
}

/// Prior-stage state required by stage 2
pub struct PlanStageInput<'a> {
    pub upload: &'a StoredFile,
    pub plan: &'a PlanOutcome,
}

impl WorkflowSession {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: WorkflowState::Start,
            created_at: now,
            updated_at: now,
            upload: None,
            query: None,
            all_columns: Vec::new(),
            eligible_columns: None,
            completeness: None,
            assessment: None,
            confirmed_columns: Vec::new(),
            clarification: None,
            plan: None,
            results: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn advance(&mut self, state: WorkflowState) {
        self.state = state;
        self.touch();
    }

    /// Stage 1 guard: request text, eligible column list and uploaded file
    pub fn column_stage_input(&self) -> Result<ColumnStageInput<'_>> {
        match (
            self.query.as_deref().filter(|q| !q.is_empty()),
            self.eligible_columns.as_deref(),
            self.upload.as_ref(),
        ) {
            (Some(query), Some(eligible_columns), Some(upload)) => Ok(ColumnStageInput {
                query,
                eligible_columns,
                upload,
            }),
            _ => Err(PilotError::session(
                "Data from the previous step was not found. Start the analysis again.",
            )),
        }
    }

    /// Stage 2 guard: uploaded file and a non-empty plan
    pub fn plan_stage_input(&self) -> Result<PlanStageInput<'_>> {
        let plan = self
            .plan
            .as_ref()
            .filter(|p| !matches!(p, PlanOutcome::Valid { steps } if steps.is_empty()));
        match (self.upload.as_ref(), plan) {
            (Some(upload), Some(plan)) => Ok(PlanStageInput { upload, plan }),
            _ => Err(PilotError::session(
                "No data was found to run the analysis. Start the analysis again.",
            )),
        }
    }
}

/// The stored dataset must be unchanged since it was profiled
pub fn verify_upload(upload: &StoredFile) -> Result<()> {
    let path: &Path = &upload.path;
    if !path.exists() {
        return Err(PilotError::session(format!(
            "The uploaded file '{}' is no longer available. Start the analysis again.",
            upload.original_name
        )));
    }
    if fingerprint(path)? != upload.sha256 {
        return Err(PilotError::session(format!(
            "The uploaded file '{}' changed since it was profiled. Start the analysis again.",
            upload.original_name
        )));
    }
    Ok(())
}
