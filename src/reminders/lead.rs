use std::fmt;

use serde::{Deserialize, Serialize};

/// Lead of the always-on last-minute reminder.
pub const FINAL_LEAD_MINUTES: i64 = 5;

/// The user's preferred primary reminder lead, as stored in their settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReminderSetting {
    ThirtyMinutes,
    OneHour,
    ThreeHours,
    #[default]
    OneDay,
    TwoDays,
}

impl ReminderSetting {
    pub const ALL: [ReminderSetting; 5] = [
        ReminderSetting::ThirtyMinutes,
        ReminderSetting::OneHour,
        ReminderSetting::ThreeHours,
        ReminderSetting::OneDay,
        ReminderSetting::TwoDays,
    ];

    /// Settings key; unknown keys fall back to one day.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim() {
            "30min" => ReminderSetting::ThirtyMinutes,
            "1hour" => ReminderSetting::OneHour,
            "3hours" => ReminderSetting::ThreeHours,
            "1day" => ReminderSetting::OneDay,
            "2days" => ReminderSetting::TwoDays,
            other => {
                if !other.is_empty() {
                    tracing::debug!("unknown reminder setting '{other}', using 1day");
                }
                ReminderSetting::default()
            }
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ReminderSetting::ThirtyMinutes => "30min",
            ReminderSetting::OneHour => "1hour",
            ReminderSetting::ThreeHours => "3hours",
            ReminderSetting::OneDay => "1day",
            ReminderSetting::TwoDays => "2days",
        }
    }

    pub const fn minutes(&self) -> i64 {
        match self {
            ReminderSetting::ThirtyMinutes => 30,
            ReminderSetting::OneHour => 60,
            ReminderSetting::ThreeHours => 180,
            ReminderSetting::OneDay => 24 * 60,
            ReminderSetting::TwoDays => 48 * 60,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            ReminderSetting::ThirtyMinutes => "30 minutes",
            ReminderSetting::OneHour => "1 hour",
            ReminderSetting::ThreeHours => "3 hours",
            ReminderSetting::OneDay => "1 day",
            ReminderSetting::TwoDays => "2 days",
        }
    }

    /// The primary lead, plus the five-minute lead when the primary is
    /// longer than that.
    pub fn lead_times(&self) -> Vec<LeadTime> {
        let mut leads = vec![LeadTime::new(self.minutes(), self.label())];
        if self.minutes() > FINAL_LEAD_MINUTES {
            leads.push(LeadTime::new(FINAL_LEAD_MINUTES, "5 minutes"));
        }
        leads
    }
}

impl fmt::Display for ReminderSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ReminderSetting {
    fn from(raw: String) -> Self {
        Self::parse_or_default(&raw)
    }
}

impl From<ReminderSetting> for String {
    fn from(setting: ReminderSetting) -> Self {
        setting.as_str().to_string()
    }
}

/// How long before an event a reminder fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeadTime {
    pub minutes: i64,
    pub label: String,
}

impl LeadTime {
    pub fn new(minutes: i64, label: impl Into<String>) -> Self {
        Self {
            minutes,
            label: label.into(),
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.minutes)
    }
}

impl fmt::Display for LeadTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
