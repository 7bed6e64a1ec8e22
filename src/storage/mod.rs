pub mod database;
pub mod session_store;

pub use database::{Database, SharedDatabase};
pub use session_store::{SessionStore, SessionSummary};
