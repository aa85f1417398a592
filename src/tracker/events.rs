use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    models::Session,
    reminder::{BreakOver, ReminderFired},
};

use super::elapsed::{break_ends_at, current_pause_seconds, worked_seconds};

/// Display projection of the tracked session at one instant.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub session: Option<Session>,
    pub worked_seconds: i64,
    pub current_pause_seconds: i64,
    pub break_ends_at: Option<DateTime<Utc>>,
    /// A write is in flight and `session` is the optimistic view.
    pub pending: bool,
    pub at: DateTime<Utc>,
}

impl TrackerSnapshot {
    pub fn project(session: Option<Session>, pending: bool, now: DateTime<Utc>) -> Self {
        let (worked, paused, ends) = match &session {
            Some(s) => (
                worked_seconds(s, now),
                current_pause_seconds(s, now),
                break_ends_at(s),
            ),
            None => (0, 0, None),
        };
        Self {
            session,
            worked_seconds: worked,
            current_pause_seconds: paused,
            break_ends_at: ends,
            pending,
            at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type", content = "payload")]
pub enum TrackerEvent {
    StateChanged(TrackerSnapshot),
    Heartbeat(TrackerSnapshot),
    SessionCompleted(Session),
    ReminderFired(ReminderFired),
    /// The fired reminder was answered or cancelled; hide the prompt.
    ReminderCleared { session_id: String },
    BreakOver(BreakOver),
    MutationFailed { message: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: TrackerEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: TrackerEvent) {
        match &event {
            TrackerEvent::Heartbeat(snapshot) => {
                debug!("heartbeat: worked {}s", snapshot.worked_seconds)
            }
            TrackerEvent::MutationFailed { message } => warn!("mutation failed: {message}"),
            other => info!("tracker event: {other:?}"),
        }
    }
}

/// Forwards events to a tokio channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: UnboundedSender<TrackerEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: UnboundedSender<TrackerEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: TrackerEvent) {
        let _ = self.tx.send(event);
    }
}
