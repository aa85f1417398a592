//! Per-day worked-hours totals. Recomputed on demand, never persisted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    models::{Session, SessionStatus},
    tracker::elapsed::worked_hours,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Sum of the frozen `duration_hours` of completed sessions.
    pub completed_hours: f64,
    /// Live worked hours of the open session, if it belongs to this day.
    pub live_hours: f64,
    pub total_hours: f64,
    pub completed_sessions: usize,
    pub open_session: Option<String>,
}

pub fn summarize_day(
    sessions: &[Session],
    open: Option<&Session>,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> DailySummary {
    let completed: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed && s.work_date == day)
        .collect();
    let completed_hours: f64 = completed.iter().filter_map(|s| s.duration_hours).sum();

    let open = open.filter(|s| s.is_open() && s.work_date == day);
    let live_hours = open.map(|s| worked_hours(s, now)).unwrap_or(0.0);

    DailySummary {
        date: day,
        completed_hours,
        live_hours,
        total_hours: completed_hours + live_hours,
        completed_sessions: completed.len(),
        open_session: open.map(|s| s.id.clone()),
    }
}

/// One summary per day from `from` through `to`, inclusive.
pub fn summarize_range(
    sessions: &[Session],
    open: Option<&Session>,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<DailySummary> {
    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| summarize_day(sessions, open, day, now))
        .collect()
}

/// "4h 30m" style rendering for hour totals.
pub fn format_hours(hours: f64) -> String {
    let minutes = (hours.max(0.0) * 60.0).round() as i64;
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
