use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bus::{ClientEvent, EventBus};

use super::lead::{LeadTime, ReminderSetting};

/// Something with a start time that can be reminded about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderEvent {
    pub id: String,
    pub company: String,
    pub position: String,
    /// Start time as the user entered it, for display.
    pub time_label: String,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReminderKey {
    pub event_id: String,
    pub lead: LeadTime,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().expect("manual clock mutex poisoned") = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("manual clock mutex poisoned")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRemaining {
    pub minutes: i64,
    pub hours: i64,
    pub days: i64,
    pub is_past: bool,
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    clock: Arc<dyn Clock>,
    timers: DashMap<ReminderKey, ArmedTimer>,
    generation: AtomicU64,
    bus: Option<Arc<EventBus>>,
}

/// One-shot reminder timers keyed by `(event id, lead)`.
///
/// Timers sleep on the runtime's monotonic clock. When a timer wakes after
/// its event has already started (the machine slept through it) the reminder
/// is skipped; any other late wake-up fires right away.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

impl ReminderScheduler {
    pub fn new(clock: Arc<dyn Clock>, bus: Option<Arc<EventBus>>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                clock,
                timers: DashMap::new(),
                generation: AtomicU64::new(0),
                bus,
            }),
        }
    }

    /// Replace every armed timer with timers for `events`. Returns how many
    /// were armed.
    pub fn arm<F, Fut>(&self, events: &[ReminderEvent], setting: ReminderSetting, on_fire: F) -> usize
    where
        F: Fn(ReminderEvent, LeadTime) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.clear_all();

        let on_fire = Arc::new(on_fire);
        let now = self.inner.clock.now();
        let leads = setting.lead_times();
        let mut armed = 0;

        for event in events.iter().filter(|event| event.starts_at > now) {
            for lead in &leads {
                let fire_at = event.starts_at - lead.duration();
                let Ok(delay) = (fire_at - now).to_std() else {
                    continue;
                };
                if delay.is_zero() {
                    continue;
                }
                self.arm_one(event.clone(), lead.clone(), delay, on_fire.clone());
                armed += 1;
            }
        }

        info!("armed {armed} reminders for {} events ({setting})", events.len());
        armed
    }

    fn arm_one<F, Fut>(&self, event: ReminderEvent, lead: LeadTime, delay: Duration, on_fire: Arc<F>)
    where
        F: Fn(ReminderEvent, LeadTime) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = ReminderKey {
            event_id: event.id.clone(),
            lead: lead.clone(),
        };
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let task_key = key.clone();

        // Hold the shard until the entry exists so a short timer always finds it.
        let entry = self.inner.timers.entry(key);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Drop our own entry first so a clear during the callback cannot
            // abort the reminder half-way.
            if inner
                .timers
                .remove_if(&task_key, |_, timer| timer.generation == generation)
                .is_none()
            {
                return;
            }

            if inner.clock.now() >= event.starts_at {
                debug!(
                    "skipping {} reminder for {}: event already started",
                    lead.label, event.id
                );
                return;
            }

            debug!("reminder fired for {} ({} before)", event.id, lead.label);
            if let Some(bus) = &inner.bus {
                bus.emit(ClientEvent::ReminderFired {
                    event_id: event.id.clone(),
                    lead_label: lead.label.clone(),
                });
            }
            on_fire(event, lead).await;
        });

        let timer = ArmedTimer { generation, handle };
        match entry {
            Entry::Occupied(mut occupied) => occupied.insert(timer).handle.abort(),
            Entry::Vacant(vacant) => {
                vacant.insert(timer);
            }
        }
    }

    pub fn clear_for_event(&self, event_id: &str) {
        let keys: Vec<ReminderKey> = self
            .inner
            .timers
            .iter()
            .filter(|entry| entry.key().event_id == event_id)
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            if let Some((_, timer)) = self.inner.timers.remove(&key) {
                timer.handle.abort();
            }
        }
    }

    pub fn clear_all(&self) {
        let keys: Vec<ReminderKey> = self
            .inner
            .timers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            if let Some((_, timer)) = self.inner.timers.remove(&key) {
                timer.handle.abort();
            }
        }
    }

    /// Armed keys in a stable order.
    pub fn armed_keys(&self) -> Vec<ReminderKey> {
        let mut keys: Vec<ReminderKey> = self
            .inner
            .timers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn armed_count(&self) -> usize {
        self.inner.timers.len()
    }

    pub fn time_remaining(&self, event: &ReminderEvent) -> TimeRemaining {
        let left = event.starts_at - self.inner.clock.now();
        TimeRemaining {
            minutes: left.num_minutes(),
            hours: left.num_hours(),
            days: left.num_days(),
            is_past: left.num_minutes() < 0,
        }
    }

    /// "2 days", "3 hours", "1 minute" or "Past".
    pub fn format_time_remaining(&self, event: &ReminderEvent) -> String {
        let left = self.time_remaining(event);
        if left.is_past {
            return "Past".to_string();
        }
        let (amount, unit) = if left.days > 0 {
            (left.days, "day")
        } else if left.hours > 0 {
            (left.hours, "hour")
        } else {
            (left.minutes, "minute")
        };
        if amount == 1 {
            format!("{amount} {unit}")
        } else {
            format!("{amount} {unit}s")
        }
    }
}
