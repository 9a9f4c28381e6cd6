//! Everything one signed-in user needs, wired together.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alerts::{Alerts, DesktopAlerts, DesktopNotifier, LogDesktopNotifier};
use crate::api::{ApiClient, ApiError, InterviewApi, NotificationApi, SettingsApi};
use crate::bus::EventBus;
use crate::config::ClientConfig;
use crate::interviews::upcoming_reminder_events;
use crate::notifications::NotificationStore;
use crate::notifier::Notifier;
use crate::realtime::{
    ConnectionManager, Dispatcher, RealtimeConfig, SocketTransport, WsTransport,
};
use crate::reminders::{Clock, ReminderEvent, ReminderScheduler, ReminderSetting, SystemClock};
use crate::session::AuthSession;

/// External collaborators, injectable for tests.
pub struct ClientDeps {
    pub notifications: Arc<dyn NotificationApi>,
    pub interviews: Arc<dyn InterviewApi>,
    pub settings: Arc<dyn SettingsApi>,
    pub transport: Arc<dyn SocketTransport>,
    pub desktop: Option<Arc<dyn DesktopNotifier>>,
    pub clock: Arc<dyn Clock>,
}

impl ClientDeps {
    /// Production wiring: reqwest backend, tungstenite socket, log-backed
    /// desktop alerts, system clock.
    pub fn production(config: &ClientConfig, session: &AuthSession) -> Result<Self, ApiError> {
        let api = Arc::new(ApiClient::new(config, Some(session.token.as_str()))?);
        Ok(Self {
            notifications: api.clone(),
            interviews: api.clone(),
            settings: api,
            transport: Arc::new(WsTransport::new(config.request_timeout())),
            desktop: Some(Arc::new(LogDesktopNotifier)),
            clock: Arc::new(SystemClock),
        })
    }
}

struct ReminderState {
    setting: ReminderSetting,
    events: Vec<ReminderEvent>,
}

pub struct WorkflowClient {
    session: AuthSession,
    bus: Arc<EventBus>,
    store: NotificationStore,
    connection: ConnectionManager,
    scheduler: ReminderScheduler,
    notifier: Notifier,
    interviews: Arc<dyn InterviewApi>,
    settings: Arc<dyn SettingsApi>,
    reminders: Mutex<ReminderState>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl WorkflowClient {
    /// Wire the components and start the inbound dispatch task. Must be
    /// called inside a Tokio runtime.
    pub fn new(config: &ClientConfig, session: AuthSession, deps: ClientDeps) -> Self {
        let bus = Arc::new(EventBus::new());
        let store = NotificationStore::new(deps.notifications, Some(bus.clone()));
        let (connection, inbound) = ConnectionManager::new(
            RealtimeConfig::from(config),
            deps.transport,
            Some(bus.clone()),
        );
        store.set_publisher(Arc::new(connection.clone()));

        let alerts = Alerts::new(bus.clone(), deps.desktop.map(DesktopAlerts::new));
        let dispatcher = Dispatcher::new(store.clone(), alerts.clone(), &session.user_id);
        let dispatch_task = dispatcher.spawn(inbound);

        let notifier = Notifier::new(
            alerts,
            store.clone(),
            Arc::new(connection.clone()),
            &session.user_id,
        );
        let scheduler = ReminderScheduler::new(deps.clock, Some(bus.clone()));

        Self {
            session,
            bus,
            store,
            connection,
            scheduler,
            notifier,
            interviews: deps.interviews,
            settings: deps.settings,
            reminders: Mutex::new(ReminderState {
                setting: config.reminder_setting,
                events: Vec::new(),
            }),
            dispatch_task: Mutex::new(Some(dispatch_task)),
        }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn reminder_setting(&self) -> ReminderSetting {
        self.lock_reminders().setting
    }

    /// Load notifications, open the realtime session and arm reminders.
    /// Backend failures are logged; the client keeps running with what it
    /// has. Returns the number of armed reminders.
    pub async fn start(&self) -> usize {
        info!("starting client for {}", self.session.display_label());
        if let Err(e) = self.store.fetch_all().await {
            warn!("initial notification load failed: {e}");
        }
        self.connection.connect(Some(&self.session));
        match self.refresh_reminders().await {
            Ok(armed) => armed,
            Err(e) => {
                warn!("could not load interviews for reminders: {e}");
                0
            }
        }
    }

    /// Reload the user's reminder preference and upcoming interviews, then
    /// re-arm every reminder.
    pub async fn refresh_reminders(&self) -> Result<usize, ApiError> {
        let fallback = self.reminder_setting();
        let setting = match self.settings.reminder_time().await {
            Ok(Some(raw)) => ReminderSetting::parse_or_default(&raw),
            Ok(None) => ReminderSetting::default(),
            Err(e) => {
                warn!("could not fetch user settings, using {fallback}: {e}");
                fallback
            }
        };

        let interviews = self.interviews.list_interviews().await?;
        let events = upcoming_reminder_events(&interviews);
        {
            let mut reminders = self.lock_reminders();
            reminders.setting = setting;
            reminders.events = events.clone();
        }
        Ok(self.arm(&events, setting))
    }

    /// Re-arm the known interviews under a new lead setting.
    pub fn apply_reminder_setting(&self, setting: ReminderSetting) -> usize {
        let events = {
            let mut reminders = self.lock_reminders();
            reminders.setting = setting;
            reminders.events.clone()
        };
        self.arm(&events, setting)
    }

    /// Drop the reminders of one interview (cancelled, rescheduled, deleted).
    pub fn forget_interview(&self, interview_id: &str) {
        self.scheduler.clear_for_event(interview_id);
        self.lock_reminders()
            .events
            .retain(|event| event.id != interview_id);
    }

    /// Logout: close the session, cancel reminders and forget notifications.
    pub fn shutdown(&self) {
        self.connection.disconnect();
        self.scheduler.clear_all();
        self.store.clear();
        if let Some(task) = self
            .dispatch_task
            .lock()
            .expect("dispatch task mutex poisoned")
            .take()
        {
            task.abort();
        }
        info!("client for {} shut down", self.session.user_id);
    }

    fn arm(&self, events: &[ReminderEvent], setting: ReminderSetting) -> usize {
        let notifier = self.notifier.clone();
        self.scheduler.arm(events, setting, move |event, lead| {
            let notifier = notifier.clone();
            async move {
                notifier.notify_upcoming(event, lead).await;
            }
        })
    }

    fn lock_reminders(&self) -> std::sync::MutexGuard<'_, ReminderState> {
        self.reminders.lock().expect("reminder state mutex poisoned")
    }
}
