//! Session lifecycle: `active` ⇄ `paused`/`onBreak` → `completed`.
//!
//! Transitions are pure: they take a snapshot and return the next one, so the
//! controller can apply them optimistically and roll back on a failed write.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::TrackerError,
    models::{NewSession, PauseKind, PauseRecord, Session, SessionStatus},
};

use super::elapsed::{round_hours, worked_seconds};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionEvent {
    CheckIn,
    Pause,
    TakeBreak,
    Resume,
    CheckOut,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionEvent::CheckIn => "check in",
            SessionEvent::Pause => "pause",
            SessionEvent::TakeBreak => "take a break",
            SessionEvent::Resume => "resume",
            SessionEvent::CheckOut => "check out",
        };
        f.write_str(label)
    }
}

/// Optional break scheduling requested at check-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckInOptions {
    pub break_after: Option<Duration>,
    pub break_duration_minutes: Option<u32>,
}

/// Result of applying an event to an open session.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: Session,
    /// The pause interval folded by this transition, if any.
    pub folded: Option<PauseRecord>,
}

/// Fields for a new session checked in at `now`.
pub fn check_in(
    owner_id: &str,
    now: DateTime<Utc>,
    work_date: NaiveDate,
    options: CheckInOptions,
) -> NewSession {
    NewSession {
        owner_id: owner_id.to_string(),
        check_in_time: now,
        work_date,
        break_scheduled_time: options.break_after.map(|offset| now + offset),
        break_duration_minutes: options.break_duration_minutes,
    }
}

/// Moves the in-progress pause into `total_paused_seconds`.
fn fold_pause(session: &mut Session, now: DateTime<Utc>) -> Option<PauseRecord> {
    let started = session.pause_started_at.take()?;
    let duration_seconds = (now - started).num_seconds().max(0);
    session.total_paused_seconds += duration_seconds;

    let kind = if session.status == SessionStatus::OnBreak {
        PauseKind::Break
    } else {
        PauseKind::Pause
    };

    Some(PauseRecord {
        id: Uuid::new_v4().to_string(),
        session_id: session.id.clone(),
        kind,
        started_at: started,
        ended_at: now.max(started),
        duration_seconds,
    })
}

fn invalid(session: &Session, event: SessionEvent) -> TrackerError {
    TrackerError::InvalidTransition {
        from: session.status,
        event,
    }
}

/// Applies `event` to `session` at `now`. Rejected events leave the input
/// untouched and report `InvalidTransition`.
pub fn transition(
    session: &Session,
    event: SessionEvent,
    now: DateTime<Utc>,
) -> Result<Transition, TrackerError> {
    let mut next = session.clone();
    let mut folded = None;

    match (session.status, event) {
        (SessionStatus::Active, SessionEvent::Pause) => {
            next.status = SessionStatus::Paused;
            next.pause_started_at = Some(now);
        }
        (SessionStatus::Active, SessionEvent::TakeBreak) => {
            next.status = SessionStatus::OnBreak;
            next.pause_started_at = Some(now);
        }
        (status, SessionEvent::Resume) if status.is_idle() => {
            folded = fold_pause(&mut next, now);
            if status == SessionStatus::OnBreak {
                // The break reminder is one-shot; taking the break consumes it.
                next.break_scheduled_time = None;
            }
            next.status = SessionStatus::Active;
        }
        (status, SessionEvent::CheckOut) if status.is_open() => {
            folded = fold_pause(&mut next, now);
            next.status = SessionStatus::Completed;
            let worked = worked_seconds(&next, now);
            next.check_out_time = Some(now);
            next.duration_hours = Some(round_hours(worked));
            next.break_scheduled_time = None;
        }
        _ => return Err(invalid(session, event)),
    }

    next.updated_at = now;
    Ok(Transition {
        session: next,
        folded,
    })
}

/// Moves the reminder due-time without touching status. Only active sessions
/// carry a live reminder, so anything else yields `None`.
pub fn reschedule_break(
    session: &Session,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<Session> {
    if session.status != SessionStatus::Active {
        return None;
    }
    let mut next = session.clone();
    next.break_scheduled_time = due;
    next.updated_at = now;
    Some(next)
}
