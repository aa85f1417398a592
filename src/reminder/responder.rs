//! User answers to a fired break reminder.
//!
//! Planning is pure: given the current session it decides what the answer
//! means. A session that was checked out or resumed elsewhere in the meantime
//! plans to `Ignore` rather than failing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{Session, SessionStatus},
    tracker::SessionEvent,
};

pub const DEFAULT_SNOOZE_MINUTES: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderResponse {
    StartBreak,
    /// `None` uses the configured default.
    Snooze(Option<Duration>),
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum ReminderOutcome {
    BreakStarted,
    Snoozed { until: DateTime<Utc> },
    Skipped,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePlan {
    Apply(SessionEvent),
    Reschedule {
        /// Due-time being answered, cancelled before the write.
        current: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    },
    Ignore,
}

pub fn plan_response(
    session: Option<&Session>,
    response: ReminderResponse,
    now: DateTime<Utc>,
    default_snooze: Duration,
) -> ResponsePlan {
    let Some(session) = session else {
        return ResponsePlan::Ignore;
    };
    if session.status != SessionStatus::Active {
        return ResponsePlan::Ignore;
    }

    match (response, session.break_scheduled_time) {
        (ReminderResponse::StartBreak, _) => ResponsePlan::Apply(SessionEvent::TakeBreak),
        (_, None) => ResponsePlan::Ignore,
        (ReminderResponse::Snooze(offset), Some(due)) => ResponsePlan::Reschedule {
            current: due,
            next: Some(now + offset.unwrap_or(default_snooze)),
        },
        (ReminderResponse::Skip, Some(due)) => ResponsePlan::Reschedule {
            current: due,
            next: None,
        },
    }
}
