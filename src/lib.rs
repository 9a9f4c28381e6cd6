//! WorkFlowGo realtime client library.
//!
//! Keeps a signed-in user's notifications in step with the backend and
//! reminds them of upcoming interviews. It handles:
//! - One STOMP-over-WebSocket session per user, with reconnect backoff
//! - Typed dispatch of inbound `{type, data}` messages
//! - An in-memory notification store synced through the REST API
//! - Local one-shot reminder timers ahead of each interview
//!
//! # Architecture
//!
//! - `realtime`: transport, STOMP codec, connection manager, dispatcher
//! - `notifications`: records and the store
//! - `reminders`: lead settings and the timer scheduler
//! - `api`: REST client and the traits the rest of the crate depends on
//! - `bus`: event bus for UI-facing observers
//! - `alerts`: toasts and desktop notifications
//! - `notifier`: the single path for raising a new notification
//! - `client`: wires everything for one user

pub mod alerts;
pub mod api;
pub mod bus;
pub mod client;
pub mod config;
pub mod interviews;
pub mod notifications;
pub mod notifier;
pub mod realtime;
pub mod reminders;
pub mod session;

use std::path::PathBuf;

use bus::{BusEvent, ClientEvent};
use client::{ClientDeps, WorkflowClient};
use config::ClientConfig;
use session::SessionFile;

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] config::ConfigError),
    #[error("{0}")]
    Session(#[from] session::SessionError),
    #[error("{0}")]
    Api(#[from] api::ApiError),
    #[error("{0}")]
    Realtime(#[from] realtime::RealtimeError),
    #[error("not signed in: no session at {}", .0.display())]
    NotSignedIn(PathBuf),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Headless entry point
// ---------------------------------------------------------------------------

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workflowgo=debug,info".parse().expect("valid env filter")),
        )
        .init();
}

/// Run the client for the stored session until Ctrl-C, then log out of the
/// realtime session cleanly.
pub async fn run() -> Result<(), AppError> {
    init_tracing();

    let config = ClientConfig::from_env()?;
    let data_dir = config.resolve_data_dir();
    let session_file = SessionFile::in_dir(&data_dir);
    let Some(session) = session_file.load()? else {
        return Err(AppError::NotSignedIn(session_file.path().to_path_buf()));
    };

    let deps = ClientDeps::production(&config, &session)?;
    let client = WorkflowClient::new(&config, session, deps);

    let mut events = client.bus().subscribe();
    let logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            log_bus_event(&event);
        }
    });

    let armed = client.start().await;
    tracing::info!(
        "{armed} reminders armed ({}), {} notifications, {} unread",
        client.reminder_setting(),
        client.store().len(),
        client.store().unread_count()
    );

    tokio::signal::ctrl_c().await?;
    client.shutdown();
    logger.abort();
    Ok(())
}

fn log_bus_event(event: &BusEvent) {
    match &event.event {
        ClientEvent::Alert {
            level, title, body, ..
        } => tracing::info!(
            target: "workflowgo::alert",
            "[{level}] {title}{}",
            body.as_deref().map(|b| format!(": {b}")).unwrap_or_default()
        ),
        other => tracing::debug!(target: "workflowgo::bus", "#{} {other:?}", event.seq),
    }
}
