//! Local reminder timers for upcoming interviews.

mod lead;
mod scheduler;

pub use lead::{LeadTime, ReminderSetting, FINAL_LEAD_MINUTES};
pub use scheduler::{
    Clock, ManualClock, ReminderEvent, ReminderKey, ReminderScheduler, SystemClock, TimeRemaining,
};
