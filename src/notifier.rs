//! The single path for raising a new notification from this client.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::alerts::Alerts;
use crate::notifications::{
    NotificationDraft, NotificationKind, NotificationStore, RealtimePublisher, RelatedEntityType,
};
use crate::realtime::MessageKind;
use crate::reminders::{LeadTime, ReminderEvent};

#[derive(Clone)]
pub struct Notifier {
    alerts: Alerts,
    store: NotificationStore,
    publisher: Arc<dyn RealtimePublisher>,
    user_id: String,
}

impl Notifier {
    pub fn new(
        alerts: Alerts,
        store: NotificationStore,
        publisher: Arc<dyn RealtimePublisher>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            alerts,
            store,
            publisher,
            user_id: user_id.into(),
        }
    }

    /// Alert locally, then hand the notification to the broker when
    /// connected or persist it through the store otherwise. Returns true when
    /// it went out over the realtime session.
    pub async fn send_notification(&self, draft: NotificationDraft) -> bool {
        self.alerts.toast(draft.kind, &draft.title, Some(&draft.message));
        self.alerts.desktop(&draft.title, &draft.message).await;

        if self.publisher.is_connected() {
            match serde_json::to_value(&draft) {
                Ok(notification) => {
                    match self
                        .publisher
                        .publish(MessageKind::Notification, json!({ "notification": notification }))
                    {
                        Ok(()) => return true,
                        Err(e) => debug!("realtime publish failed, saving instead: {e}"),
                    }
                }
                Err(e) => warn!("could not serialize notification: {e}"),
            }
        }

        self.store.create(draft).await;
        false
    }

    /// Reminder-timer callback for an upcoming interview.
    pub async fn notify_upcoming(&self, event: ReminderEvent, lead: LeadTime) -> bool {
        let title = format!("Interview Reminder: {}", event.company);
        let message = format!(
            "{} interview at {} (in {})",
            event.position, event.time_label, lead.label
        );
        let draft = NotificationDraft::new(&self.user_id, title, message, NotificationKind::Info)
            .related_to(RelatedEntityType::Interview, event.id);
        self.send_notification(draft).await
    }
}
