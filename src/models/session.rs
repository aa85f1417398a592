//! Session records and partial updates.
//!
//! A `Session` is one continuous work-tracking record from check-in to
//! check-out. Only one non-completed session exists per owner at a time.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    Paused,
    OnBreak,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::OnBreak => "onBreak",
            SessionStatus::Completed => "completed",
        }
    }

    /// Paused and on-break are the same "not working" state for transitions.
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionStatus::Paused | SessionStatus::OnBreak)
    }

    pub fn is_open(&self) -> bool {
        *self != SessionStatus::Completed
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub check_in_time: DateTime<Utc>,
    /// Calendar day the session is counted on, fixed at check-in.
    pub work_date: NaiveDate,
    pub status: SessionStatus,
    pub total_paused_seconds: i64,
    pub pause_started_at: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub break_scheduled_time: Option<DateTime<Utc>>,
    pub break_duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session {session_id}: {reason}")]
pub struct InvariantViolation {
    pub session_id: String,
    pub reason: String,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Checks the record-level invariants that must hold after every write.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let fail = |reason: &str| {
            Err(InvariantViolation {
                session_id: self.id.clone(),
                reason: reason.to_string(),
            })
        };

        if self.total_paused_seconds < 0 {
            return fail("total_paused_seconds is negative");
        }
        if self.status.is_idle() != self.pause_started_at.is_some() {
            return fail("pause_started_at must be set exactly while paused or on break");
        }
        let completed = self.status == SessionStatus::Completed;
        if completed != self.check_out_time.is_some() {
            return fail("check_out_time must be set exactly when completed");
        }
        if completed != self.duration_hours.is_some() {
            return fail("duration_hours must be set exactly when completed");
        }
        if let Some(check_out) = self.check_out_time {
            if check_out < self.check_in_time {
                return fail("check_out_time precedes check_in_time");
            }
        }
        if completed && self.break_scheduled_time.is_some() {
            return fail("completed session still has a scheduled break");
        }
        Ok(())
    }
}

/// Fields supplied by the engine when a session is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub owner_id: String,
    pub check_in_time: DateTime<Utc>,
    pub work_date: NaiveDate,
    pub break_scheduled_time: Option<DateTime<Utc>>,
    pub break_duration_minutes: Option<u32>,
}

impl NewSession {
    pub fn into_session(self, id: String) -> Session {
        Session {
            id,
            owner_id: self.owner_id,
            check_in_time: self.check_in_time,
            work_date: self.work_date,
            status: SessionStatus::Active,
            total_paused_seconds: 0,
            pause_started_at: None,
            check_out_time: None,
            duration_hours: None,
            break_scheduled_time: self.break_scheduled_time,
            break_duration_minutes: self.break_duration_minutes,
            created_at: self.check_in_time,
            updated_at: self.check_in_time,
        }
    }
}

/// Partial update. Clearable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub total_paused_seconds: Option<i64>,
    pub pause_started_at: Option<Option<DateTime<Utc>>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub break_scheduled_time: Option<Option<DateTime<Utc>>>,
    pub break_duration_minutes: Option<Option<u32>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
    (before != after).then(|| after.clone())
}

impl SessionPatch {
    /// Fields that differ between two snapshots of the same session.
    pub fn between(before: &Session, after: &Session) -> Self {
        Self {
            status: changed(&before.status, &after.status),
            total_paused_seconds: changed(&before.total_paused_seconds, &after.total_paused_seconds),
            pause_started_at: changed(&before.pause_started_at, &after.pause_started_at),
            check_out_time: changed(&before.check_out_time, &after.check_out_time).flatten(),
            duration_hours: changed(&before.duration_hours, &after.duration_hours).flatten(),
            break_scheduled_time: changed(&before.break_scheduled_time, &after.break_scheduled_time),
            break_duration_minutes: changed(
                &before.break_duration_minutes,
                &after.break_duration_minutes,
            ),
            updated_at: changed(&before.updated_at, &after.updated_at),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, session: &mut Session) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(total) = self.total_paused_seconds {
            session.total_paused_seconds = total;
        }
        if let Some(pause_started_at) = self.pause_started_at {
            session.pause_started_at = pause_started_at;
        }
        if let Some(check_out) = self.check_out_time {
            session.check_out_time = Some(check_out);
        }
        if let Some(hours) = self.duration_hours {
            session.duration_hours = Some(hours);
        }
        if let Some(scheduled) = self.break_scheduled_time {
            session.break_scheduled_time = scheduled;
        }
        if let Some(minutes) = self.break_duration_minutes {
            session.break_duration_minutes = minutes;
        }
        if let Some(updated_at) = self.updated_at {
            session.updated_at = updated_at;
        }
    }
}
