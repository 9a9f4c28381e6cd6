use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for ids minted on this device when the backend could not.
pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Info => write!(f, "info"),
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedEntityType {
    Interview,
    Document,
    System,
}

/// A notification as the backend and the broker describe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_type: Option<RelatedEntityType>,
}

impl NotificationRecord {
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }
}

/// A notification that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_type: Option<RelatedEntityType>,
}

impl NotificationDraft {
    /// Unread draft stamped with the current time.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            message: message.into(),
            kind,
            is_read: false,
            created_at: Utc::now().to_rfc3339(),
            related_entity_id: None,
            related_entity_type: None,
        }
    }

    pub fn related_to(mut self, entity_type: RelatedEntityType, entity_id: impl Into<String>) -> Self {
        self.related_entity_type = Some(entity_type);
        self.related_entity_id = Some(entity_id.into());
        self
    }

    pub fn with_id(self, id: impl Into<String>) -> NotificationRecord {
        NotificationRecord {
            id: id.into(),
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            is_read: self.is_read,
            created_at: self.created_at,
            related_entity_id: self.related_entity_id,
            related_entity_type: self.related_entity_type,
        }
    }

    /// Materialize with a device-local id.
    pub fn into_local(self) -> NotificationRecord {
        self.with_id(local_id())
    }
}

pub fn local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4())
}
