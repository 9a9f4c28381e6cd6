//! `WorkflowClient` lifecycle with a fake backend and broker.

mod common;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Local, Utc};
use pretty_assertions::assert_eq;

use common::fake_backend::{interview, notification};
use common::{eventually, FakeBackend, MockBroker};
use workflowgo_lib::client::{ClientDeps, WorkflowClient};
use workflowgo_lib::config::ClientConfig;
use workflowgo_lib::interviews::InterviewStatus;
use workflowgo_lib::realtime::{ConnectionState, StompCommand};
use workflowgo_lib::reminders::{ManualClock, ReminderSetting};
use workflowgo_lib::session::AuthSession;

fn test_config() -> ClientConfig {
    ClientConfig {
        ws_base_url: "ws://broker.test/api".to_string(),
        reconnect_base_delay_ms: 20,
        reconnect_max_delay_ms: 80,
        request_timeout_ms: 1_000,
        ..ClientConfig::default()
    }
}

/// Date and time strings for a local start `days` from now, at noon.
fn local_slot(days: i64) -> (String, String) {
    let day = Local::now().date_naive() + ChronoDuration::days(days);
    (day.format("%Y-%m-%d").to_string(), "12:00".to_string())
}

fn client_with(backend: FakeBackend, broker: &MockBroker) -> WorkflowClient {
    let backend = Arc::new(backend);
    let deps = ClientDeps {
        notifications: backend.clone(),
        interviews: backend.clone(),
        settings: backend,
        transport: broker.transport(),
        desktop: None,
        clock: Arc::new(ManualClock::new(Utc::now())),
    };
    WorkflowClient::new(&test_config(), AuthSession::new("u1", "tok"), deps)
}

#[tokio::test]
async fn start_loads_connects_and_arms_reminders() {
    let broker = MockBroker::new();
    let mut backend = FakeBackend::new();
    *backend.notifications.lock().unwrap() = vec![notification("n1", false), notification("n2", true)];
    let (soon_date, soon_time) = local_slot(5);
    let (later_date, later_time) = local_slot(9);
    backend.interviews = vec![
        interview("iv1", &soon_date, &soon_time, InterviewStatus::Scheduled),
        interview("iv2", &later_date, &later_time, InterviewStatus::Confirmed),
        interview("iv3", &soon_date, &soon_time, InterviewStatus::Cancelled),
    ];
    backend.reminder_time = Some("3hours".to_string());

    let client = client_with(backend, &broker);
    let armed = client.start().await;

    // Two interviews, each with the 3-hour and 5-minute leads.
    assert_eq!(armed, 4);
    assert_eq!(client.reminder_setting(), ReminderSetting::ThreeHours);
    assert_eq!(client.store().len(), 2);
    assert_eq!(client.store().unread_count(), 1);
    assert!(eventually(|| client.connection().is_connected()).await);
    assert_eq!(broker.frames_of(StompCommand::Subscribe).len(), 1);

    client.forget_interview("iv1");
    assert_eq!(client.scheduler().armed_count(), 2);

    assert_eq!(client.apply_reminder_setting(ReminderSetting::OneDay), 2);
    let labels: Vec<String> = client
        .scheduler()
        .armed_keys()
        .into_iter()
        .map(|key| key.lead.label)
        .collect();
    assert_eq!(labels, vec!["5 minutes".to_string(), "1 day".to_string()]);

    client.shutdown();
    assert_eq!(client.connection().state(), ConnectionState::Disconnected);
    assert_eq!(client.scheduler().armed_count(), 0);
    assert!(client.store().is_empty());
}

#[tokio::test]
async fn offline_backend_still_connects() {
    let broker = MockBroker::new();
    let mut backend = FakeBackend::new();
    backend.offline = true;

    let client = client_with(backend, &broker);
    assert_eq!(client.start().await, 0);

    assert!(client.store().is_empty());
    assert!(client.store().last_error().is_some());
    assert!(eventually(|| client.connection().is_connected()).await);
    client.shutdown();
}

#[tokio::test]
async fn notifier_publishes_when_connected_and_saves_when_not() {
    let broker = MockBroker::new();
    let client = client_with(FakeBackend::new(), &broker);
    client.start().await;
    assert!(eventually(|| client.connection().is_connected()).await);

    let (date, time) = local_slot(1);
    let event = interview("iv1", &date, &time, InterviewStatus::Scheduled)
        .to_reminder_event()
        .unwrap();
    let lead = ReminderSetting::OneHour.lead_times().remove(0);

    assert!(client.notifier().notify_upcoming(event.clone(), lead.clone()).await);
    assert!(eventually(|| broker.frames_of(StompCommand::Send).len() == 1).await);
    let body: serde_json::Value =
        serde_json::from_str(&broker.frames_of(StompCommand::Send)[0].body).unwrap();
    assert_eq!(body["type"], "notification");
    assert_eq!(body["data"]["notification"]["title"], "Interview Reminder: Acme");

    client.connection().disconnect();
    assert!(!client.notifier().notify_upcoming(event, lead).await);
    let stored = client.store().snapshot();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "srv-1");
    assert_eq!(stored[0].message, "Engineer interview at 12:00 (in 1 hour)");
    client.shutdown();
}
