//! The session store boundary and an in-memory implementation.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{NewSession, PauseRecord, Session, SessionPatch, SessionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator. One open session per owner is this layer's
/// policy, not the engine's.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, fields: NewSession) -> StoreResult<Session>;

    async fn update_session(&self, id: &str, patch: SessionPatch) -> StoreResult<Session>;

    /// Most recent non-completed session for the owner.
    async fn find_open_session(&self, owner_id: &str) -> StoreResult<Option<Session>>;

    /// Completed sessions counted on `date`.
    async fn list_sessions_for_day(&self, owner_id: &str, date: NaiveDate)
        -> StoreResult<Vec<Session>>;

    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>>;

    async fn record_pause(&self, record: PauseRecord) -> StoreResult<()>;

    async fn list_pauses(&self, session_id: &str) -> StoreResult<Vec<PauseRecord>>;
}

#[derive(Default)]
struct MemoryInner {
    sessions: HashMap<String, Session>,
    pauses: Vec<PauseRecord>,
}

/// Process-local store; the SQLite `Database` is the durable one.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record as-is, bypassing the open-session check.
    pub async fn insert(&self, session: Session) {
        self.inner
            .lock()
            .await
            .sessions
            .insert(session.id.clone(), session);
    }

    pub async fn all_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> =
            self.inner.lock().await.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.check_in_time);
        sessions
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, fields: NewSession) -> StoreResult<Session> {
        let mut inner = self.inner.lock().await;
        if inner
            .sessions
            .values()
            .any(|s| s.owner_id == fields.owner_id && s.is_open())
        {
            return Err(StoreError::Conflict(format!(
                "{} already has an open session",
                fields.owner_id
            )));
        }

        let session = fields.into_session(Uuid::new_v4().to_string());
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> StoreResult<Session> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply_to(session);
        Ok(session.clone())
    }

    async fn find_open_session(&self, owner_id: &str) -> StoreResult<Option<Session>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.owner_id == owner_id && s.is_open())
            .max_by_key(|s| s.check_in_time)
            .cloned())
    }

    async fn list_sessions_for_day(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Session>> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| {
                s.owner_id == owner_id
                    && s.work_date == date
                    && s.status == SessionStatus::Completed
            })
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.check_in_time);
        Ok(sessions)
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        Ok(self.inner.lock().await.sessions.get(id).cloned())
    }

    async fn record_pause(&self, record: PauseRecord) -> StoreResult<()> {
        self.inner.lock().await.pauses.push(record);
        Ok(())
    }

    async fn list_pauses(&self, session_id: &str) -> StoreResult<Vec<PauseRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .pauses
            .iter()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn new_session(owner: &str, at: &str) -> NewSession {
        let check_in_time = fixed_time(at);
        NewSession {
            owner_id: owner.to_string(),
            check_in_time,
            work_date: check_in_time.date_naive(),
            break_scheduled_time: None,
            break_duration_minutes: None,
        }
    }

    #[tokio::test]
    async fn second_open_session_is_rejected() {
        let store = MemoryStore::new();
        store
            .create_session(new_session("ana", "2026-03-02T09:00:00Z"))
            .await
            .expect("first session");

        let err = store
            .create_session(new_session("ana", "2026-03-02T10:00:00Z"))
            .await
            .expect_err("second open session");
        assert!(matches!(err, StoreError::Conflict(_)));

        store
            .create_session(new_session("ben", "2026-03-02T10:00:00Z"))
            .await
            .expect("other owner is independent");
    }

    #[tokio::test]
    async fn update_unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_session("missing", SessionPatch::default())
            .await
            .expect_err("unknown id");
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn day_listing_only_returns_completed_sessions() {
        let store = MemoryStore::new();
        let open = store
            .create_session(new_session("ana", "2026-03-02T09:00:00Z"))
            .await
            .expect("create");

        let listed = store
            .list_sessions_for_day("ana", open.work_date)
            .await
            .expect("list");
        assert!(listed.is_empty());

        let patch = SessionPatch {
            status: Some(SessionStatus::Completed),
            check_out_time: Some(fixed_time("2026-03-02T10:00:00Z")),
            duration_hours: Some(1.0),
            ..SessionPatch::default()
        };
        store.update_session(&open.id, patch).await.expect("update");

        let listed = store
            .list_sessions_for_day("ana", open.work_date)
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert!(store
            .find_open_session("ana")
            .await
            .expect("find")
            .is_none());
    }
}
