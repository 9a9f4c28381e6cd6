//! The `{type, data}` envelope carried inside STOMP frame bodies.
//!
//! Inbound envelopes decode into [`InboundMessage`], one variant per message
//! kind, so handlers match exhaustively instead of poking at loose JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notifications::NotificationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Notification,
    NotificationUpdate,
    NotificationRead,
    NotificationDelete,
    InterviewReminder,
    SystemMessage,
}

impl MessageKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::NotificationUpdate => "notification_update",
            Self::NotificationRead => "notification_read",
            Self::NotificationDelete => "notification_delete",
            Self::InterviewReminder => "interview_reminder",
            Self::SystemMessage => "system_message",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "notification" => Ok(Self::Notification),
            "notification_update" => Ok(Self::NotificationUpdate),
            "notification_read" => Ok(Self::NotificationRead),
            "notification_delete" => Ok(Self::NotificationDelete),
            "interview_reminder" => Ok(Self::InterviewReminder),
            "system_message" => Ok(Self::SystemMessage),
            _ => Err(DecodeError::UnknownType(value.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame body: {0}")]
    Malformed(String),
    #[error("envelope has no type")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: MessageKind, reason: String },
}

/// Outbound envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: &'a Value,
}

impl<'a> Envelope<'a> {
    pub fn new(kind: MessageKind, data: &'a Value) -> Self {
        Self { kind, data }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Which records a `notification_read` frame refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadTarget {
    One(String),
    All,
    /// Neither an id nor `all: true`; nothing to apply.
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderInterview {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewReminderPayload {
    #[serde(default)]
    pub interview: Option<ReminderInterview>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reminder_label: Option<String>,
    #[serde(default)]
    pub notification: Option<NotificationRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Notification {
        notification: Option<NotificationRecord>,
    },
    NotificationUpdate,
    NotificationRead(ReadTarget),
    NotificationDelete {
        id: Option<String>,
    },
    InterviewReminder(InterviewReminderPayload),
    SystemMessage {
        title: Option<String>,
        message: Option<String>,
    },
}

#[derive(Deserialize, Default)]
struct NotificationPayload {
    #[serde(default)]
    notification: Option<NotificationRecord>,
}

#[derive(Deserialize, Default)]
struct IdPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    all: Option<bool>,
}

#[derive(Deserialize, Default)]
struct SystemPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl InboundMessage {
    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let kind_raw = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(DecodeError::MissingType)?;
        let kind: MessageKind = kind_raw.parse()?;
        let data = match value.get("data") {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(data) => data.clone(),
        };

        let message = match kind {
            MessageKind::Notification => {
                let payload: NotificationPayload = payload(kind, data)?;
                Self::Notification {
                    notification: payload.notification,
                }
            }
            MessageKind::NotificationUpdate => Self::NotificationUpdate,
            MessageKind::NotificationRead => {
                let payload: IdPayload = payload(kind, data)?;
                let target = match (payload.id, payload.all) {
                    (Some(id), _) if !id.is_empty() => ReadTarget::One(id),
                    (_, Some(true)) => ReadTarget::All,
                    _ => ReadTarget::Nothing,
                };
                Self::NotificationRead(target)
            }
            MessageKind::NotificationDelete => {
                let payload: IdPayload = payload(kind, data)?;
                Self::NotificationDelete {
                    id: payload.id.filter(|id| !id.is_empty()),
                }
            }
            MessageKind::InterviewReminder => Self::InterviewReminder(payload(kind, data)?),
            MessageKind::SystemMessage => {
                let payload: SystemPayload = payload(kind, data)?;
                Self::SystemMessage {
                    title: payload.title,
                    message: payload.message,
                }
            }
        };
        Ok(message)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Notification { .. } => MessageKind::Notification,
            Self::NotificationUpdate => MessageKind::NotificationUpdate,
            Self::NotificationRead(_) => MessageKind::NotificationRead,
            Self::NotificationDelete { .. } => MessageKind::NotificationDelete,
            Self::InterviewReminder(_) => MessageKind::InterviewReminder,
            Self::SystemMessage { .. } => MessageKind::SystemMessage,
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(kind: MessageKind, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|e| DecodeError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}
