//! In-process event bus for client-side observers.
//!
//! Everything a UI would react to flows through here:
//! - `Alert`: ephemeral toast-style alerts
//! - `NotificationsChanged`: store mutations with the live unread count
//! - `ConnectionChanged`: realtime session state transitions
//! - `ReminderFired`: a reminder timer went off

mod event_bus;
mod event_types;

pub use event_bus::{BusEvent, EventBus};
pub use event_types::{ClientEvent, ALERT_DURATION_MS, REMINDER_ALERT_DURATION_MS};
