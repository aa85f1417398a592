pub mod controller;
pub mod elapsed;
pub mod events;
pub mod state;

pub use controller::{TickReport, TrackerController, TrackerDeps};
pub use events::{ChannelEventSink, EventSink, LogEventSink, TrackerEvent, TrackerSnapshot};
pub use state::{CheckInOptions, SessionEvent, Transition};
