//! In-app toasts and OS-level desktop alerts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bus::{ClientEvent, EventBus, ALERT_DURATION_MS};
use crate::notifications::NotificationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopPermission {
    Default,
    Granted,
    Denied,
}

/// Platform desktop notification capability.
#[async_trait]
pub trait DesktopNotifier: Send + Sync {
    fn permission(&self) -> DesktopPermission;
    async fn request_permission(&self) -> DesktopPermission;
    fn show(&self, title: &str, body: &str);
}

/// Desktop alerts gated on user permission.
///
/// Permission is requested at most once per process and never after the
/// user has denied it.
#[derive(Clone)]
pub struct DesktopAlerts {
    notifier: Arc<dyn DesktopNotifier>,
    asked: Arc<tokio::sync::Mutex<bool>>,
}

impl DesktopAlerts {
    pub fn new(notifier: Arc<dyn DesktopNotifier>) -> Self {
        Self {
            notifier,
            asked: Arc::new(tokio::sync::Mutex::new(false)),
        }
    }

    /// Resolve the permission, asking the user if it is still undecided.
    pub async fn ensure_permission(&self) -> DesktopPermission {
        match self.notifier.permission() {
            DesktopPermission::Default => {}
            decided => return decided,
        }
        let mut asked = self.asked.lock().await;
        if *asked {
            return self.notifier.permission();
        }
        *asked = true;
        let answer = self.notifier.request_permission().await;
        debug!("desktop notification permission: {answer:?}");
        answer
    }

    /// Show when permitted; otherwise silently skip. Returns whether shown.
    pub async fn show(&self, title: &str, body: &str) -> bool {
        if self.ensure_permission().await != DesktopPermission::Granted {
            return false;
        }
        self.notifier.show(title, body);
        true
    }
}

/// Writes desktop alerts to the log. Used by the headless binary.
#[derive(Debug, Default)]
pub struct LogDesktopNotifier;

#[async_trait]
impl DesktopNotifier for LogDesktopNotifier {
    fn permission(&self) -> DesktopPermission {
        DesktopPermission::Granted
    }

    async fn request_permission(&self) -> DesktopPermission {
        DesktopPermission::Granted
    }

    fn show(&self, title: &str, body: &str) {
        info!(target: "workflowgo::desktop", "{title}: {body}");
    }
}

/// Both alert channels behind one handle.
#[derive(Clone)]
pub struct Alerts {
    bus: Arc<EventBus>,
    desktop: Option<DesktopAlerts>,
}

impl Alerts {
    pub fn new(bus: Arc<EventBus>, desktop: Option<DesktopAlerts>) -> Self {
        Self { bus, desktop }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn toast(&self, level: NotificationKind, title: &str, body: Option<&str>) {
        self.toast_for(level, title, body, ALERT_DURATION_MS);
    }

    pub fn toast_for(
        &self,
        level: NotificationKind,
        title: &str,
        body: Option<&str>,
        duration_ms: u64,
    ) {
        self.bus.emit(ClientEvent::alert_for(
            level,
            title,
            body.map(str::to_string),
            duration_ms,
        ));
    }

    pub async fn desktop(&self, title: &str, body: &str) -> bool {
        match &self.desktop {
            Some(desktop) => desktop.show(title, body).await,
            None => false,
        }
    }
}
