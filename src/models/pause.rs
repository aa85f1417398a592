use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PauseKind {
    Pause,
    Break,
}

impl PauseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PauseKind::Pause => "pause",
            PauseKind::Break => "break",
        }
    }
}

/// A folded not-working interval, kept as session history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PauseRecord {
    pub id: String,
    pub session_id: String,
    pub kind: PauseKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
}
