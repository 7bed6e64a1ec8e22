//! Guided analysis workflow: assessment, planning and plan execution

pub mod executor;
pub mod plan;
pub mod prompts;
pub mod requester;
pub mod session;
pub mod stages;

pub use executor::{ExecutionRun, ExecutionSummary, PlanExecutor, StepResult, StepStatus};
pub use plan::{PlanStep, describe_step};
pub use requester::{AssessmentOutcome, PlanOutcome, PlanRequester, Suggestion};
pub use session::{WorkflowSession, WorkflowState};
pub use stages::{ProviderFactory, Stage, StageOutcome, StageReport, Workflow};
