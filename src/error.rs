use thiserror::Error;

use crate::{
    models::{InvariantViolation, SessionStatus},
    store::StoreError,
    tracker::SessionEvent,
};

/// Every failure the engine reports. All of them are recoverable: the local
/// view is left at the last confirmed state and the ticker keeps running.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("cannot {event} while the session is {from}")]
    InvalidTransition {
        from: SessionStatus,
        event: SessionEvent,
    },

    #[error("no open session for {owner_id}")]
    NoOpenSession { owner_id: String },

    #[error("session store write failed: {0}")]
    Store(#[from] StoreError),

    #[error("store returned an inconsistent session: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl TrackerError {
    /// Short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            TrackerError::InvalidTransition { from, event } => {
                format!("You can't {event} right now (session is {from}).")
            }
            TrackerError::NoOpenSession { .. } => "You are not checked in.".to_string(),
            TrackerError::Store(_) | TrackerError::Invariant(_) => {
                "Could not save your session. Nothing was changed; please try again.".to_string()
            }
        }
    }
}
