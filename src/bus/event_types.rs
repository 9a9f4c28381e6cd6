//! Event payloads carried on the client bus.

use serde::{Deserialize, Serialize};

use crate::notifications::NotificationKind;

/// How long a regular toast stays on screen.
pub const ALERT_DURATION_MS: u64 = 5_000;
/// Interview reminders linger longer.
pub const REMINDER_ALERT_DURATION_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Ephemeral in-app alert.
    Alert {
        level: NotificationKind,
        title: String,
        body: Option<String>,
        duration_ms: u64,
        closable: bool,
    },
    /// The notification collection changed.
    NotificationsChanged { total: usize, unread: usize },
    /// The realtime session moved to a new state.
    ConnectionChanged { state: String },
    /// A reminder timer fired.
    ReminderFired { event_id: String, lead_label: String },
}

impl ClientEvent {
    pub fn alert(level: NotificationKind, title: impl Into<String>, body: Option<String>) -> Self {
        Self::Alert {
            level,
            title: title.into(),
            body,
            duration_ms: ALERT_DURATION_MS,
            closable: true,
        }
    }

    pub fn alert_for(
        level: NotificationKind,
        title: impl Into<String>,
        body: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self::Alert {
            level,
            title: title.into(),
            body,
            duration_ms,
            closable: true,
        }
    }
}
