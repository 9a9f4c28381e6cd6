use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alerts::Alerts;
use crate::bus::REMINDER_ALERT_DURATION_MS;
use crate::notifications::{
    NotificationDraft, NotificationKind, NotificationRecord, NotificationStore, RelatedEntityType,
};

use super::envelope::{InboundMessage, InterviewReminderPayload, ReadTarget};

/// Applies inbound realtime messages to the store and raises alerts.
#[derive(Clone)]
pub struct Dispatcher {
    store: NotificationStore,
    alerts: Alerts,
    user_id: String,
}

impl Dispatcher {
    pub fn new(store: NotificationStore, alerts: Alerts, user_id: impl Into<String>) -> Self {
        Self {
            store,
            alerts,
            user_id: user_id.into(),
        }
    }

    /// Consume bodies in arrival order until the channel closes.
    pub fn spawn(self, mut inbound: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(body) = inbound.recv().await {
                self.dispatch(&body).await;
            }
            debug!("inbound channel closed, dispatcher stopping");
        })
    }

    /// Decode and apply one frame body. Undecodable bodies are logged and
    /// dropped.
    pub async fn dispatch(&self, body: &str) {
        match InboundMessage::decode(body) {
            Ok(message) => {
                debug!("dispatching {} message", message.kind());
                self.apply(message).await;
            }
            Err(e) => warn!("dropping realtime message: {e}"),
        }
    }

    pub async fn apply(&self, message: InboundMessage) {
        match message {
            InboundMessage::Notification { notification } => {
                let Some(record) = notification else {
                    debug!("notification message without a record");
                    return;
                };
                self.store.insert(record.clone());
                self.alerts
                    .toast(record.kind, &record.title, Some(&record.message));
                self.alerts.desktop(&record.title, &record.message).await;
            }
            InboundMessage::NotificationUpdate => {
                if let Err(e) = self.store.fetch_all().await {
                    warn!("refresh after notification_update failed: {e}");
                }
            }
            InboundMessage::NotificationRead(target) => match target {
                ReadTarget::One(id) => {
                    self.store.set_read(&id, true);
                }
                ReadTarget::All => {
                    self.store.set_all_read(true);
                }
                ReadTarget::Nothing => debug!("notification_read without id or all"),
            },
            InboundMessage::NotificationDelete { id } => match id {
                Some(id) => {
                    self.store.remove(&id);
                }
                None => debug!("notification_delete without id"),
            },
            InboundMessage::InterviewReminder(payload) => self.interview_reminder(payload).await,
            InboundMessage::SystemMessage { title, message } => {
                let title = title.unwrap_or_else(|| "System Message".to_string());
                info!("system message: {title}");
                self.alerts
                    .toast(NotificationKind::Info, &title, message.as_deref());
            }
        }
    }

    async fn interview_reminder(&self, payload: InterviewReminderPayload) {
        let Some(interview) = payload.interview else {
            debug!("interview_reminder without interview");
            return;
        };
        let title = payload
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Interview Reminder: {}", interview.company_name));
        let mut body = format!("{} interview at {}", interview.position, interview.time);
        if let Some(label) = payload.reminder_label.as_deref().filter(|l| !l.is_empty()) {
            body.push_str(&format!(" (in {label})"));
        }

        self.alerts.toast_for(
            NotificationKind::Info,
            &title,
            Some(&body),
            REMINDER_ALERT_DURATION_MS,
        );
        self.alerts.desktop(&title, &body).await;

        let record = match payload.notification {
            Some(record) => record,
            None => self.reminder_record(&title, &body, interview.id),
        };
        self.store.insert(record);
    }

    fn reminder_record(
        &self,
        title: &str,
        body: &str,
        interview_id: Option<String>,
    ) -> NotificationRecord {
        let mut draft = NotificationDraft::new(&self.user_id, title, body, NotificationKind::Info);
        if let Some(id) = interview_id {
            draft = draft.related_to(RelatedEntityType::Interview, id);
        }
        draft.into_local()
    }
}
