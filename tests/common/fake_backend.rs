//! REST backend double with a canned data set.

use std::sync::Mutex;

use async_trait::async_trait;

use workflowgo_lib::api::{ApiError, InterviewApi, NotificationApi, SettingsApi};
use workflowgo_lib::interviews::{Interview, InterviewStatus};
use workflowgo_lib::notifications::{NotificationDraft, NotificationKind, NotificationRecord};

pub struct FakeBackend {
    pub notifications: Mutex<Vec<NotificationRecord>>,
    pub interviews: Vec<Interview>,
    pub reminder_time: Option<String>,
    pub offline: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            interviews: Vec::new(),
            reminder_time: None,
            offline: false,
        }
    }

    fn check(&self) -> Result<(), ApiError> {
        if self.offline {
            return Err(ApiError::Request("backend offline".to_string()));
        }
        Ok(())
    }
}

pub fn notification(id: &str, is_read: bool) -> NotificationRecord {
    NotificationDraft {
        is_read,
        ..NotificationDraft::new("u1", format!("title {id}"), "body", NotificationKind::Info)
    }
    .with_id(id)
}

pub fn interview(id: &str, date: &str, time: &str, status: InterviewStatus) -> Interview {
    Interview {
        id: id.to_string(),
        company_name: "Acme".to_string(),
        position: "Engineer".to_string(),
        date: date.to_string(),
        time: time.to_string(),
        status,
        interview_type: None,
        location: None,
        notes: None,
    }
}

#[async_trait]
impl NotificationApi for FakeBackend {
    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>, ApiError> {
        self.check()?;
        Ok(self.notifications.lock().unwrap().clone())
    }

    async fn create_notification(
        &self,
        draft: &NotificationDraft,
    ) -> Result<NotificationRecord, ApiError> {
        self.check()?;
        let mut stored = self.notifications.lock().unwrap();
        let record = draft.clone().with_id(format!("srv-{}", stored.len() + 1));
        stored.insert(0, record.clone());
        Ok(record)
    }

    async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        self.check()?;
        for record in self.notifications.lock().unwrap().iter_mut() {
            if record.id == id {
                record.is_read = true;
            }
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.check()?;
        for record in self.notifications.lock().unwrap().iter_mut() {
            record.is_read = true;
        }
        Ok(())
    }

    async fn delete_notification(&self, id: &str) -> Result<(), ApiError> {
        self.check()?;
        self.notifications.lock().unwrap().retain(|n| n.id != id);
        Ok(())
    }

    async fn unread_count(&self) -> Result<usize, ApiError> {
        self.check()?;
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| !n.is_read)
            .count())
    }
}

#[async_trait]
impl InterviewApi for FakeBackend {
    async fn list_interviews(&self) -> Result<Vec<Interview>, ApiError> {
        self.check()?;
        Ok(self.interviews.clone())
    }
}

#[async_trait]
impl SettingsApi for FakeBackend {
    async fn reminder_time(&self) -> Result<Option<String>, ApiError> {
        self.check()?;
        Ok(self.reminder_time.clone())
    }
}
