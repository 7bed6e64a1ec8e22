//! Keyed store for workflow session records

use rusqlite::{OptionalExtension, params};
use serde::Serialize;

use super::database::SharedDatabase;
use crate::types::{Result, ResultExt, SessionId};
use crate::workflow::{WorkflowSession, WorkflowState};

/// Listing row for `status`
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub state: String,
    pub original_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_current: bool,
}

#[derive(Clone)]
pub struct SessionStore {
    db: SharedDatabase,
}

impl SessionStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Insert or replace the record and make it the current session
    pub fn save(&self, session: &WorkflowSession) -> Result<()> {
        let record = serde_json::to_string(session)?;
        let state = serde_json::to_value(session.state)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let original_name = session.upload.as_ref().map(|u| u.original_name.clone());
        let id = session.id.as_str().to_string();
        let created_at = session.created_at.to_rfc3339();
        let updated_at = session.updated_at.to_rfc3339();

        self.db.transaction(move |conn| {
            conn.execute(
                "INSERT INTO workflow_sessions (id, state, original_name, record, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    state = excluded.state,
                    original_name = excluded.original_name,
                    record = excluded.record,
                    updated_at = excluded.updated_at",
                params![id, state, original_name, record, created_at, updated_at],
            )?;
            conn.execute(
                "INSERT INTO current_session (slot, session_id) VALUES (1, ?1)
                 ON CONFLICT(slot) DO UPDATE SET session_id = excluded.session_id",
                params![id],
            )?;
            Ok(())
        })?;

        tracing::debug!("Saved session {} ({})", session.id.short(), session.state);
        Ok(())
    }

    pub fn load(&self, id: &SessionId) -> Result<Option<WorkflowSession>> {
        let record: Option<String> = self
            .db
            .connection()?
            .query_row(
                "SELECT record FROM workflow_sessions WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context("Failed to load session")?;

        record
            .map(|json| serde_json::from_str(&json).map_err(Into::into))
            .transpose()
    }

    /// Removes the record; the current pointer goes with it
    pub fn delete(&self, id: &SessionId) -> Result<bool> {
        let removed = self
            .db
            .connection()?
            .execute(
                "DELETE FROM workflow_sessions WHERE id = ?1",
                params![id.as_str()],
            )
            .with_context("Failed to delete session")?;
        Ok(removed > 0)
    }

    pub fn current_id(&self) -> Result<Option<SessionId>> {
        let id: Option<String> = self
            .db
            .connection()?
            .query_row(
                "SELECT session_id FROM current_session WHERE slot = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .with_context("Failed to read current session")?;
        Ok(id.map(SessionId::from))
    }

    pub fn current(&self) -> Result<Option<WorkflowSession>> {
        match self.current_id()? {
            Some(id) => self.load(&id),
            None => Ok(None),
        }
    }

    /// Resolve an explicit id, or fall back to the current session
    pub fn resolve(&self, id: Option<&str>) -> Result<Option<WorkflowSession>> {
        match id {
            Some(id) => self.load(&SessionId::from(id)),
            None => self.current(),
        }
    }

    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let current = self.current_id()?;
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, state, original_name, created_at, updated_at
             FROM workflow_sessions ORDER BY updated_at DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SessionSummary {
                    id: row.get(0)?,
                    state: row.get(1)?,
                    original_name: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                    is_current: false,
                })
            })?
            .filter_map(|r| r.ok())
            .map(|mut summary| {
                summary.is_current = current.as_ref().is_some_and(|c| c.as_str() == summary.id);
                summary
            })
            .collect();
        Ok(rows)
    }

    /// Sessions that never reached completion, for `clean`
    pub fn unfinished(&self) -> Result<Vec<WorkflowSession>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare("SELECT record FROM workflow_sessions")?;
        let records: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records
            .iter()
            .filter_map(|json| serde_json::from_str::<WorkflowSession>(json).ok())
            .filter(|s| s.state != WorkflowState::Completed)
            .collect())
    }

    pub fn delete_all(&self) -> Result<usize> {
        let removed = self
            .db
            .connection()?
            .execute("DELETE FROM workflow_sessions", [])
            .with_context("Failed to clear sessions")?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::Arc;

    fn store() -> SessionStore {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        SessionStore::new(Arc::new(db))
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = store();
        let mut session = WorkflowSession::new(SessionId::generate());
        session.query = Some("compare age".into());
        session.advance(WorkflowState::AwaitingColumnConfirmation);
        store.save(&session).unwrap();

        let loaded = store.load(&session.id).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(store.current_id().unwrap(), Some(session.id.clone()));
    }

    #[test]
    fn test_save_updates_in_place() {
        let store = store();
        let mut session = WorkflowSession::new(SessionId::generate());
        store.save(&session).unwrap();
        session.advance(WorkflowState::AwaitingPlanConfirmation);
        store.save(&session).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].state, "awaiting_plan_confirmation");
        assert!(listed[0].is_current);
    }

    #[test]
    fn test_delete_clears_current_pointer() {
        let store = store();
        let session = WorkflowSession::new(SessionId::generate());
        store.save(&session).unwrap();

        assert!(store.delete(&session.id).unwrap());
        assert!(!store.delete(&session.id).unwrap());
        assert!(store.current().unwrap().is_none());
        assert!(store.load(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_resolve_prefers_explicit_id() {
        let store = store();
        let first = WorkflowSession::new(SessionId::generate());
        let second = WorkflowSession::new(SessionId::generate());
        store.save(&first).unwrap();
        store.save(&second).unwrap();

        assert_eq!(store.resolve(None).unwrap().unwrap().id, second.id);
        assert_eq!(
            store.resolve(Some(first.id.as_str())).unwrap().unwrap().id,
            first.id
        );
        assert!(store.resolve(Some("missing")).unwrap().is_none());
    }

    #[test]
    fn test_unfinished_skips_completed() {
        let store = store();
        let open = WorkflowSession::new(SessionId::generate());
        let mut done = WorkflowSession::new(SessionId::generate());
        done.advance(WorkflowState::Completed);
        store.save(&open).unwrap();
        store.save(&done).unwrap();

        let unfinished = store.unfinished().unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].id, open.id);
        assert_eq!(store.delete_all().unwrap(), 2);
    }
}
