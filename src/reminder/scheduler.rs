//! Break reminder timing.
//!
//! The scheduler only decides *when* a reminder is due; side effects belong to
//! the controller. De-duplication is keyed on the exact due-time value, so a
//! re-fetch of unchanged state can never fire the same reminder twice.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{Session, SessionStatus},
    tracker::elapsed::break_ends_at,
};

pub const DEFAULT_FIRE_WINDOW_SECS: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderFired {
    pub session_id: String,
    pub due_at: DateTime<Utc>,
    pub fired_at: DateTime<Utc>,
    pub break_duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BreakOver {
    pub session_id: String,
    pub break_started_at: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
}

/// True when `due − now` lies in `(−window, 0]`.
pub fn is_due(due: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    let diff = due - now;
    diff <= Duration::zero() && diff > -window
}

#[derive(Debug, Clone)]
pub struct BreakScheduler {
    window: Duration,
    /// Due-times already fired or cancelled.
    consumed: Option<DateTime<Utc>>,
    /// Break start for which the break-over notice was sent.
    break_over_sent: Option<DateTime<Utc>>,
}

impl Default for BreakScheduler {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_FIRE_WINDOW_SECS))
    }
}

impl BreakScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            consumed: None,
            break_over_sent: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns a reminder the first time `session`'s due-time is in window.
    pub fn poll(&mut self, session: &Session, now: DateTime<Utc>) -> Option<ReminderFired> {
        if session.status != SessionStatus::Active {
            return None;
        }
        let due = session.break_scheduled_time?;
        if self.consumed == Some(due) || !is_due(due, now, self.window) {
            return None;
        }

        self.consumed = Some(due);
        Some(ReminderFired {
            session_id: session.id.clone(),
            due_at: due,
            fired_at: now,
            break_duration_minutes: session.break_duration_minutes,
        })
    }

    /// One notice per break once its planned length has elapsed.
    pub fn poll_break_over(&mut self, session: &Session, now: DateTime<Utc>) -> Option<BreakOver> {
        let planned_end = break_ends_at(session)?;
        let started = session.pause_started_at?;
        if now < planned_end || self.break_over_sent == Some(started) {
            return None;
        }

        self.break_over_sent = Some(started);
        Some(BreakOver {
            session_id: session.id.clone(),
            break_started_at: started,
            planned_end,
        })
    }

    /// Marks `due` as handled so it can no longer fire.
    pub fn cancel(&mut self, due: DateTime<Utc>) {
        self.consumed = Some(due);
    }

    pub fn has_fired(&self, due: DateTime<Utc>) -> bool {
        self.consumed == Some(due)
    }

    /// Forget all latches, used when a different session is attached.
    pub fn reset(&mut self) {
        self.consumed = None;
        self.break_over_sent = None;
    }
}
