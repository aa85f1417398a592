pub mod responder;
pub mod scheduler;

pub use responder::{plan_response, ReminderOutcome, ReminderResponse, ResponsePlan};
pub use scheduler::{BreakOver, BreakScheduler, ReminderFired};
