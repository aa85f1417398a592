//! Worked-time projection. Read-only: nothing here mutates a session.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Session, SessionStatus};

fn whole_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().max(0)
}

/// Seconds of the pause currently in progress, zero when working or done.
pub fn current_pause_seconds(session: &Session, now: DateTime<Utc>) -> i64 {
    match (session.status.is_idle(), session.pause_started_at) {
        (true, Some(started)) => whole_seconds(started, now),
        _ => 0,
    }
}

/// Worked seconds at `now`: wall time since check-in minus folded pauses and
/// the pause in progress. Completed sessions stop accruing at check-out.
pub fn worked_seconds(session: &Session, now: DateTime<Utc>) -> i64 {
    let until = match (session.status, session.check_out_time) {
        (SessionStatus::Completed, Some(check_out)) => check_out,
        _ => now,
    };

    let wall = whole_seconds(session.check_in_time, until);
    let worked = wall - session.total_paused_seconds - current_pause_seconds(session, until);
    worked.max(0)
}

pub fn worked_hours(session: &Session, now: DateTime<Utc>) -> f64 {
    worked_seconds(session, now) as f64 / 3600.0
}

/// Hours rounded to two decimals, the precision persisted at check-out.
pub fn round_hours(seconds: i64) -> f64 {
    (seconds as f64 / 3600.0 * 100.0).round() / 100.0
}

/// When the current break is planned to end, if on one with a planned length.
pub fn break_ends_at(session: &Session) -> Option<DateTime<Utc>> {
    if session.status != SessionStatus::OnBreak {
        return None;
    }
    let started = session.pause_started_at?;
    let minutes = session.break_duration_minutes?;
    Some(started + Duration::minutes(i64::from(minutes)))
}
