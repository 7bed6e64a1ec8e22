//! Stage handlers for the guided workflow.
//!
//! Each handler loads the session record, checks the guards for its stage,
//! does one unit of work and saves the record back. Input problems, guard
//! violations, errors and panics are all caught here: the upload is removed,
//! the session is cleared and the caller gets a [`StageReport`] that says the
//! workflow is back at the start.

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::executor::PlanExecutor;
use super::requester::{PlanOutcome, PlanRequester};
use super::session::{WorkflowSession, WorkflowState, verify_upload};
use crate::ai::{SharedProvider, create_provider};
use crate::config::{Config, LlmConfig};
use crate::data::{LoadOptions, StoredFile, cleanup_file, load_dataset, profile, store_upload};
use crate::storage::SessionStore;
use crate::types::{Notice, PilotError, Result, SessionId, panic_message};

/// Builds the assessment service client for a stage
pub type ProviderFactory = Box<dyn Fn(&LlmConfig) -> Result<SharedProvider> + Send + Sync>;

const NO_SESSION: &str = "No active analysis session. Start a new analysis.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Assessment,
    Planning,
    Execution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assessment => write!(f, "stage 0 (column assessment)"),
            Self::Planning => write!(f, "stage 1 (plan proposal)"),
            Self::Execution => write!(f, "stage 2 (plan execution)"),
        }
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    /// The session advanced, or its current view is re-presented
    Ready(Box<WorkflowSession>),
    /// The workflow is back at the start and no session is kept
    Reset,
}

#[derive(Debug)]
pub struct StageReport {
    pub outcome: StageOutcome,
    pub notices: Vec<Notice>,
}

impl StageReport {
    fn ready(session: WorkflowSession, notices: Vec<Notice>) -> Self {
        Self {
            outcome: StageOutcome::Ready(Box::new(session)),
            notices,
        }
    }

    fn reset(notice: Notice) -> Self {
        Self {
            outcome: StageOutcome::Reset,
            notices: vec![notice],
        }
    }

    pub fn session(&self) -> Option<&WorkflowSession> {
        match &self.outcome {
            StageOutcome::Ready(session) => Some(session),
            StageOutcome::Reset => None,
        }
    }

    pub fn is_reset(&self) -> bool {
        matches!(self.outcome, StageOutcome::Reset)
    }
}

/// What an aborted stage must tear down
struct Teardown {
    session_id: SessionId,
    upload: Option<PathBuf>,
}

impl Teardown {
    fn of(session: &WorkflowSession) -> Self {
        Self {
            session_id: session.id.clone(),
            upload: session.upload.as_ref().map(|u| u.path.clone()),
        }
    }
}

pub struct Workflow {
    config: Config,
    store: SessionStore,
    provider_factory: ProviderFactory,
}

impl Workflow {
    pub fn new(config: Config, store: SessionStore) -> Self {
        Self::with_provider_factory(config, store, Box::new(create_provider))
    }

    pub fn with_provider_factory(
        config: Config,
        store: SessionStore,
        provider_factory: ProviderFactory,
    ) -> Self {
        Self {
            config,
            store,
            provider_factory,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            skip_descriptor_row: self.config.workflow.skip_descriptor_row,
        }
    }

    fn requester(&self) -> Result<PlanRequester> {
        let provider = (self.provider_factory)(&self.config.llm)?;
        Ok(PlanRequester::new(provider, &self.config.llm))
    }

    // =========================================================================
    // Stage 0: intake, profiling, column assessment
    // =========================================================================

    pub async fn start(&self, file: &Path, query: &str) -> StageReport {
        let query = query.trim();
        if query.is_empty() {
            return StageReport::reset(Notice::warning(
                "A request describing the analysis is required.",
            ));
        }

        let mut session = WorkflowSession::new(SessionId::generate());
        let upload = match store_upload(
            file,
            &self.config.workflow.upload_dir,
            &session.id,
            self.config.workflow.max_upload_bytes,
        ) {
            Ok(upload) => upload,
            Err(e) if e.is_input_error() => return StageReport::reset(Notice::warning(e.to_string())),
            Err(e) => {
                error!("Could not store '{}': {}", file.display(), e);
                return StageReport::reset(Notice::danger(format!(
                    "An internal error occurred during {}: {}",
                    Stage::Assessment,
                    e
                )));
            }
        };

        info!("Session {} started for '{}'", session.id.short(), upload.original_name);
        session.upload = Some(upload.clone());
        session.query = Some(query.to_string());
        let teardown = Teardown::of(&session);

        self.guarded(
            Stage::Assessment,
            teardown,
            self.assess(session, upload, query),
        )
        .await
    }

    async fn assess(
        &self,
        mut session: WorkflowSession,
        upload: StoredFile,
        query: &str,
    ) -> Result<StageReport> {
        let dataset = load_dataset(&upload.path, self.load_options())?;
        let report = profile(&dataset);

        if report.all_columns_empty() {
            return Err(PilotError::input(format!(
                "Every column in '{}' is 100% missing; there is nothing to analyse.",
                upload.original_name
            )));
        }

        let mut notices = vec![Notice::info(format!(
            "Loaded '{}': {} rows, {} columns ({} usable).",
            upload.original_name,
            dataset.row_count(),
            report.columns.len(),
            report.eligible_columns.len()
        ))];

        let requester = self.requester()?;
        let assessment = requester
            .assess(query, &report.eligible_columns, &report.summary)
            .await;
        if let Some(message) = assessment.error_message() {
            notices.push(Notice::warning(message));
        }

        session.all_columns = dataset.column_names();
        session.eligible_columns = Some(report.eligible_columns.clone());
        session.completeness = Some(report);
        session.assessment = Some(assessment);
        session.advance(WorkflowState::AwaitingColumnConfirmation);
        self.store.save(&session)?;

        Ok(StageReport::ready(session, notices))
    }

    // =========================================================================
    // Stage 1: column confirmation, plan proposal
    // =========================================================================

    pub async fn confirm(
        &self,
        session_id: Option<&str>,
        columns: &[String],
        clarification: Option<&str>,
    ) -> Result<StageReport> {
        let Some(session) = self.store.resolve(session_id)? else {
            return Ok(StageReport::reset(Notice::danger(NO_SESSION)));
        };
        let teardown = Teardown::of(&session);
        Ok(self
            .guarded(
                Stage::Planning,
                teardown,
                self.propose(session, columns, clarification),
            )
            .await)
    }

    async fn propose(
        &self,
        mut session: WorkflowSession,
        columns: &[String],
        clarification: Option<&str>,
    ) -> Result<StageReport> {
        let input = session.column_stage_input()?;
        let query = input.query.to_string();

        let mut selected: Vec<String> = Vec::new();
        for column in columns.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            if !selected.iter().any(|s| s == column) {
                selected.push(column.to_string());
            }
        }

        if selected.is_empty() {
            return Ok(StageReport::ready(
                session,
                vec![Notice::warning(
                    "Select at least one column for the analysis.",
                )],
            ));
        }

        let unknown: Vec<&String> = selected
            .iter()
            .filter(|c| !input.eligible_columns.contains(c))
            .collect();
        if !unknown.is_empty() {
            let listed: Vec<String> = unknown.iter().map(|c| format!("'{}'", c)).collect();
            warn!("Rejected columns outside the eligible list: {}", listed.join(", "));
            return Ok(StageReport::ready(
                session,
                vec![Notice::warning(format!(
                    "Columns not available for analysis: {}.",
                    listed.join(", ")
                ))],
            ));
        }

        let clarification = clarification
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let requester = self.requester()?;
        let plan = requester
            .plan(&query, &selected, clarification.as_deref())
            .await;

        let mut notices = Vec::new();
        match &plan {
            PlanOutcome::Valid { steps } if steps.is_empty() => {
                notices.push(Notice::warning("The proposed plan contains no steps."))
            }
            PlanOutcome::Valid { steps } => notices.push(Notice::info(format!(
                "Proposed plan with {} steps. Review it before running the analysis.",
                steps.len()
            ))),
            PlanOutcome::ShapeError { message, .. } => {
                error!("Plan in unexpected format: {}", message);
                notices.push(Notice::danger(
                    "The plan service returned the plan in an unexpected format.",
                ));
            }
            PlanOutcome::ServiceError { .. } | PlanOutcome::Blocked { .. } => {
                if let Some(message) = plan.error_message() {
                    notices.push(Notice::warning(format!("Plan generation failed. {}", message)));
                }
            }
        }

        session.confirmed_columns = selected;
        session.clarification = clarification;
        session.plan = Some(plan);
        session.results = None;
        session.advance(WorkflowState::AwaitingPlanConfirmation);
        self.store.save(&session)?;

        Ok(StageReport::ready(session, notices))
    }

    // =========================================================================
    // Stage 2: plan execution
    // =========================================================================

    pub async fn execute(&self, session_id: Option<&str>) -> Result<StageReport> {
        let Some(session) = self.store.resolve(session_id)? else {
            return Ok(StageReport::reset(Notice::danger(NO_SESSION)));
        };
        let teardown = Teardown::of(&session);
        Ok(self
            .guarded(Stage::Execution, teardown, self.run_plan(session))
            .await)
    }

    async fn run_plan(&self, mut session: WorkflowSession) -> Result<StageReport> {
        let input = session.plan_stage_input()?;
        let upload = input.upload.clone();
        let plan = input.plan.clone();

        verify_upload(&upload)?;
        let dataset = load_dataset(&upload.path, self.load_options())?;

        // An invalid plan still runs, as a one-element error plan
        let mut notices = Vec::new();
        if let Some(message) = plan.error_message() {
            error!("Executing the error plan of an invalid plan: {}", message);
            notices.push(Notice::danger(format!(
                "The analysis plan is invalid. {}",
                message
            )));
        }
        let run = PlanExecutor::new(&dataset, self.config.workflow.significance_level)
            .execute(&plan.to_steps());
        notices.extend(run.notices.iter().cloned());

        session.results = Some(run);
        session.advance(WorkflowState::Completed);

        // Record before file: if the delete fails the outer teardown owns the upload
        self.store.delete(&session.id)?;
        cleanup_file(&upload.path);
        info!("Session {} completed", session.id.short());

        Ok(StageReport::ready(session, notices))
    }

    // =========================================================================
    // Restart
    // =========================================================================

    /// Drop the session and its upload
    pub fn restart(&self, session_id: Option<&str>) -> Result<StageReport> {
        let Some(session) = self.store.resolve(session_id)? else {
            return Ok(StageReport::reset(Notice::info(NO_SESSION)));
        };
        if let Some(upload) = &session.upload {
            cleanup_file(&upload.path);
        }
        self.store.delete(&session.id)?;
        info!("Session {} cleared", session.id.short());
        Ok(StageReport::reset(Notice::info(
            "Session cleared. Start a new analysis.",
        )))
    }

    // =========================================================================
    // Outer boundary
    // =========================================================================

    async fn guarded<F>(&self, stage: Stage, teardown: Teardown, body: F) -> StageReport
    where
        F: Future<Output = Result<StageReport>>,
    {
        let notice = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(Ok(report)) => return report,
            Ok(Err(e)) if e.is_input_error() => {
                warn!("{} rejected the input: {}", stage, e);
                Notice::warning(e.to_string())
            }
            Ok(Err(PilotError::Session(message))) => {
                warn!("{} session check failed: {}", stage, message);
                Notice::danger(format!("Session error: {}", message))
            }
            Ok(Err(PilotError::Config(message))) => {
                error!("{} could not reach the assessment service: {}", stage, message);
                Notice::danger(format!(
                    "The assessment service is not available: {}",
                    message
                ))
            }
            Ok(Err(e)) => {
                error!("Fatal error during {}: {:?}", stage, e);
                Notice::danger(format!("An internal error occurred during {}: {}", stage, e))
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!("{} panicked: {}", stage, reason);
                Notice::danger(format!("An internal error occurred during {}: {}", stage, reason))
            }
        };

        self.tear_down(&teardown);
        StageReport::reset(notice)
    }

    fn tear_down(&self, teardown: &Teardown) {
        if let Some(path) = &teardown.upload {
            cleanup_file(path);
        }
        if let Err(e) = self.store.delete(&teardown.session_id) {
            error!(
                "Could not clear session {}: {}",
                teardown.session_id.short(),
                e
            );
        }
    }
}
