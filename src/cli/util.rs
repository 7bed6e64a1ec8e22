//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::config::{Config, ConfigLoader};
use crate::storage::{Database, SessionStore, SharedDatabase};
use crate::types::Result;
use crate::workflow::Workflow;

/// Command execution context
///
/// Configuration plus the opened session database. Created via
/// `CommandContext::load()` by every workflow command.
#[derive(Clone)]
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Shared database handle
    pub db: SharedDatabase,
    /// Session records
    pub store: SessionStore,
}

impl CommandContext {
    /// Load config and open (creating if needed) the session database
    pub fn load() -> Result<Self> {
        let config = ConfigLoader::load()?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let db = Database::open(&config.storage.database_path)?;
        db.initialize()?;
        let db: SharedDatabase = Arc::new(db);

        Ok(Self {
            config,
            store: SessionStore::new(db.clone()),
            db,
        })
    }

    pub fn workflow(&self) -> Workflow {
        Workflow::new(self.config.clone(), self.store.clone())
    }
}

/// Drive an async stage handler to completion on a fresh runtime
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = Runtime::new()?;
    Ok(rt.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PilotError;

    #[test]
    fn test_block_on_drives_future() {
        assert_eq!(block_on(async { 40 + 2 }).unwrap(), 42);
    }

    #[test]
    fn test_runtime_failure_is_io_error() {
        let failure = std::io::Error::other("no threads left");
        let err: PilotError = failure.into();
        assert!(matches!(err, PilotError::Io(_)));
        assert!(!err.to_string().starts_with("Session error"));
    }
}
