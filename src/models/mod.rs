pub mod pause;
pub mod session;

pub use pause::{PauseKind, PauseRecord};
pub use session::{InvariantViolation, NewSession, Session, SessionPatch, SessionStatus};
