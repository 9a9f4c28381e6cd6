use std::time::Duration;

use httpmock::Method::{DELETE, GET, POST, PUT};
use httpmock::MockServer;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::api::{ApiClient, ApiError, InterviewApi, NotificationApi, SettingsApi};
use crate::interviews::InterviewStatus;
use crate::notifications::{NotificationDraft, NotificationKind, RelatedEntityType};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::with_base_url(
        format!("{}/api", server.base_url()),
        Duration::from_secs(5),
        Some("tok-123"),
    )
    .unwrap()
}

#[tokio::test]
async fn lists_notifications_with_bearer_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/notifications")
            .header("authorization", "Bearer tok-123");
        then.status(200).json_body(json!([
            {
                "id": "n1",
                "userId": "u1",
                "title": "Interview tomorrow",
                "message": "Acme at 10:00",
                "type": "warning",
                "isRead": false,
                "createdAt": "2030-01-01T09:00:00Z",
                "relatedEntityId": "iv1",
                "relatedEntityType": "interview"
            },
            { "id": "n2", "title": "Welcome", "isRead": true }
        ]));
    });

    let records = client(&server).list_notifications().await.unwrap();
    mock.assert();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, NotificationKind::Warning);
    assert_eq!(records[0].related_entity_type, Some(RelatedEntityType::Interview));
    assert!(records[1].is_read);
}

#[tokio::test]
async fn create_posts_draft_and_returns_canonical_record() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/notifications")
            .header("content-type", "application/json")
            .body_contains("\"title\":\"Saved\"")
            .body_contains("\"type\":\"success\"");
        then.status(201).json_body(json!({
            "id": "srv-1",
            "userId": "u1",
            "title": "Saved",
            "message": "Document uploaded",
            "type": "success",
            "isRead": false,
            "createdAt": "2030-01-01T09:00:00Z"
        }));
    });

    let draft = NotificationDraft::new("u1", "Saved", "Document uploaded", NotificationKind::Success);
    let record = client(&server).create_notification(&draft).await.unwrap();
    mock.assert();
    assert_eq!(record.id, "srv-1");
    assert!(!record.is_local());
}

#[tokio::test]
async fn mark_read_and_delete_hit_expected_paths() {
    let server = MockServer::start();
    let read = server.mock(|when, then| {
        when.method(PUT).path("/api/notifications/n1/read");
        then.status(200).json_body(json!({ "success": true }));
    });
    let read_all = server.mock(|when, then| {
        when.method(PUT).path("/api/notifications/read-all");
        then.status(204);
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/api/notifications/n1");
        then.status(200).body("");
    });

    let api = client(&server);
    api.mark_read("n1").await.unwrap();
    api.mark_all_read().await.unwrap();
    api.delete_notification("n1").await.unwrap();
    read.assert();
    read_all.assert();
    delete.assert();
}

#[tokio::test]
async fn success_false_body_is_a_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PUT).path("/api/notifications/n1/read");
        then.status(200).json_body(json!({ "success": false }));
    });

    let err = client(&server).mark_read("n1").await.unwrap_err();
    assert!(matches!(err, ApiError::Unsuccessful(_)), "got {err:?}");
}

#[tokio::test]
async fn error_status_carries_backend_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(DELETE).path("/api/notifications/missing");
        then.status(404).json_body(json!({ "message": "Notification not found" }));
    });

    let err = client(&server).delete_notification("missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("Notification not found"));
}

#[tokio::test]
async fn unread_count_accepts_bare_and_wrapped_bodies() {
    let bare = MockServer::start();
    bare.mock(|when, then| {
        when.method(GET).path("/api/notifications/unread-count");
        then.status(200).body("3");
    });
    let wrapped = MockServer::start();
    wrapped.mock(|when, then| {
        when.method(GET).path("/api/notifications/unread-count");
        then.status(200).json_body(json!({ "count": 5 }));
    });

    assert_eq!(client(&bare).unread_count().await.unwrap(), 3);
    assert_eq!(client(&wrapped).unread_count().await.unwrap(), 5);
}

#[tokio::test]
async fn garbage_body_is_invalid_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/notifications");
        then.status(200).body("<html>gateway</html>");
    });

    let err = client(&server).list_notifications().await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn lists_interviews() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/interviews");
        then.status(200).json_body(json!([
            {
                "id": "iv1",
                "companyName": "Acme",
                "position": "SRE",
                "date": "2030-02-01",
                "time": "10:00",
                "status": "scheduled"
            }
        ]));
    });

    let interviews = client(&server).list_interviews().await.unwrap();
    assert_eq!(interviews.len(), 1);
    assert_eq!(interviews[0].status, InterviewStatus::Scheduled);
}

#[tokio::test]
async fn reads_reminder_time_from_settings() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/user/settings");
        then.status(200).json_body(json!({
            "theme": "dark",
            "preferences": { "notifications": { "email": true, "reminderTime": "3hours" } }
        }));
    });
    let empty = MockServer::start();
    empty.mock(|when, then| {
        when.method(GET).path("/api/user/settings");
        then.status(200).json_body(json!({}));
    });

    assert_eq!(
        client(&server).reminder_time().await.unwrap().as_deref(),
        Some("3hours")
    );
    assert_eq!(client(&empty).reminder_time().await.unwrap(), None);
}

#[test]
fn rejects_empty_base_url() {
    let err = match ApiClient::with_base_url("  ", Duration::from_secs(1), None) {
        Ok(_) => panic!("empty base url should be rejected"),
        Err(e) => e,
    };
    assert!(matches!(err, ApiError::Config(_)));
}
