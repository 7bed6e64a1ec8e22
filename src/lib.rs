//! statpilot - AI-Guided Statistical Analysis
//!
//! Walks a user from a raw CSV upload to executed statistical tests in
//! three confirmable stages: column assessment, plan generation and plan
//! execution. The language model only proposes; every number is computed
//! locally.
//!
//! ## Stages
//!
//! 1. **Assessment**: profile completeness, ask the model which columns fit
//!    the request
//! 2. **Planning**: after the user confirms columns, ask for a JSON plan of
//!    analysis steps
//! 3. **Execution**: run each step (descriptive statistics, Welch t-test,
//!    chi-square) with per-step failure isolation
//!
//! ## Quick Start
//!
//! ```ignore
//! use statpilot::{ConfigLoader, Database, SessionStore, Workflow};
//!
//! let config = ConfigLoader::load()?;
//! let db = Arc::new(Database::open(&config.storage.database_path)?);
//! db.initialize()?;
//! let workflow = Workflow::new(config, SessionStore::new(db));
//! let report = workflow.start(Path::new("trial.csv"), "Does age differ by arm?").await;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: LLM provider abstraction and strict JSON extraction
//! - [`data`]: Upload intake, CSV loading, completeness profiling
//! - [`stats`]: Statistical routines and charts
//! - [`workflow`]: Plan requester, executor and the stage state machine
//! - [`storage`]: SQLite session persistence

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod data;
pub mod stats;
pub mod storage;
pub mod types;
pub mod workflow;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, PilotError, Result, ResultExt};
pub use types::{Notice, NoticeLevel, SessionId};

// Storage
pub use storage::{Database, SessionStore, SharedDatabase};

// =============================================================================
// Workflow Re-exports
// =============================================================================

pub use workflow::{
    ExecutionRun, PlanExecutor, PlanOutcome, Stage, StageOutcome, StageReport, Workflow,
    WorkflowSession, WorkflowState,
};

// =============================================================================
// Data and Stats Re-exports
// =============================================================================

pub use data::{CompletenessReport, Dataset, load_dataset, profile};
pub use stats::{ResultBundle, chi_square, descriptive_stats, welch_t_test};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{LlmProvider, LlmResponse, SharedProvider, create_provider};
