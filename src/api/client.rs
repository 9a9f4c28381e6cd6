use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::interviews::Interview;
use crate::notifications::{NotificationDraft, NotificationRecord};

use super::error::{error_message_from_body, ApiError};

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>, ApiError>;
    async fn create_notification(
        &self,
        draft: &NotificationDraft,
    ) -> Result<NotificationRecord, ApiError>;
    async fn mark_read(&self, id: &str) -> Result<(), ApiError>;
    async fn mark_all_read(&self) -> Result<(), ApiError>;
    async fn delete_notification(&self, id: &str) -> Result<(), ApiError>;
    async fn unread_count(&self) -> Result<usize, ApiError>;
}

#[async_trait]
pub trait InterviewApi: Send + Sync {
    async fn list_interviews(&self) -> Result<Vec<Interview>, ApiError>;
}

#[async_trait]
pub trait SettingsApi: Send + Sync {
    /// The raw `preferences.notifications.reminderTime` value, if set.
    async fn reminder_time(&self) -> Result<Option<String>, ApiError>;
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, token: Option<&str>) -> Result<Self, ApiError> {
        Self::with_base_url(config.api_root(), config.request_timeout(), token)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: std::time::Duration,
        token: Option<&str>,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(ApiError::Config("api base url cannot be empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ApiError::Config(format!("invalid auth token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: error_message_from_body(&body),
            });
        }
        tracing::trace!("{endpoint} -> {} ({} bytes)", status.as_u16(), body.len());
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let endpoint = format!("GET {path}");
        let body = self.send(&endpoint, self.client.get(self.url(path))).await?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("failed to parse {endpoint} response: {e}"))
        })
    }

    /// For endpoints that only report success: an empty body or anything
    /// without `success: false` counts as confirmed.
    async fn expect_success(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<(), ApiError> {
        let body = self.send(endpoint, request).await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(serde_json::Value::Bool(false)) => Err(ApiError::Unsuccessful(endpoint.to_string())),
            Ok(value) if value.get("success").and_then(|v| v.as_bool()) == Some(false) => {
                Err(ApiError::Unsuccessful(endpoint.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnreadCountBody {
    Bare(usize),
    Wrapped { count: usize },
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SettingsBody {
    #[serde(default)]
    preferences: Option<PreferencesBody>,
}

#[derive(Deserialize, Default)]
struct PreferencesBody {
    #[serde(default)]
    notifications: Option<NotificationPreferencesBody>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct NotificationPreferencesBody {
    #[serde(default)]
    reminder_time: Option<String>,
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>, ApiError> {
        self.get_json("/notifications").await
    }

    async fn create_notification(
        &self,
        draft: &NotificationDraft,
    ) -> Result<NotificationRecord, ApiError> {
        let endpoint = "POST /notifications";
        let body = self
            .send(endpoint, self.client.post(self.url("/notifications")).json(draft))
            .await?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("failed to parse {endpoint} response: {e}"))
        })
    }

    async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/notifications/{}/read", urlencoding::encode(id));
        self.expect_success(&format!("PUT {path}"), self.client.put(self.url(&path)))
            .await
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        let path = "/notifications/read-all";
        self.expect_success(&format!("PUT {path}"), self.client.put(self.url(path)))
            .await
    }

    async fn delete_notification(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/notifications/{}", urlencoding::encode(id));
        self.expect_success(&format!("DELETE {path}"), self.client.delete(self.url(&path)))
            .await
    }

    async fn unread_count(&self) -> Result<usize, ApiError> {
        let body: UnreadCountBody = self.get_json("/notifications/unread-count").await?;
        Ok(match body {
            UnreadCountBody::Bare(count) => count,
            UnreadCountBody::Wrapped { count } => count,
        })
    }
}

#[async_trait]
impl InterviewApi for ApiClient {
    async fn list_interviews(&self) -> Result<Vec<Interview>, ApiError> {
        self.get_json("/interviews").await
    }
}

#[async_trait]
impl SettingsApi for ApiClient {
    async fn reminder_time(&self) -> Result<Option<String>, ApiError> {
        let body: SettingsBody = self.get_json("/user/settings").await?;
        Ok(body
            .preferences
            .and_then(|p| p.notifications)
            .and_then(|n| n.reminder_time))
    }
}
