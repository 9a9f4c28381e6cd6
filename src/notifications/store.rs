use std::future::Future;
use std::sync::{Arc, RwLock};

use serde_json::json;

use crate::api::{ApiError, NotificationApi};
use crate::bus::{ClientEvent, EventBus};
use crate::realtime::{MessageKind, RealtimeError};

use super::model::{NotificationDraft, NotificationRecord};

/// Outbound side of the realtime session, as seen by the store.
///
/// Lets other sessions of the same user converge after a confirmed change.
pub trait RealtimePublisher: Send + Sync {
    fn is_connected(&self) -> bool;
    fn publish(&self, kind: MessageKind, data: serde_json::Value) -> Result<(), RealtimeError>;
}

#[derive(Default)]
struct StoreState {
    /// Newest first.
    notifications: Vec<NotificationRecord>,
    pending: usize,
    error: Option<String>,
}

struct StoreInner {
    api: Arc<dyn NotificationApi>,
    state: RwLock<StoreState>,
    publisher: RwLock<Option<Arc<dyn RealtimePublisher>>>,
    bus: Option<Arc<EventBus>>,
}

/// In-memory notification collection kept in step with the backend.
///
/// Read/delete changes are applied locally only after the backend confirms
/// them. Creation is the exception: a failed remote create still inserts a
/// `local-` record so the user sees it.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<StoreInner>,
}

impl NotificationStore {
    pub fn new(api: Arc<dyn NotificationApi>, bus: Option<Arc<EventBus>>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                api,
                state: RwLock::new(StoreState::default()),
                publisher: RwLock::new(None),
                bus,
            }),
        }
    }

    pub fn set_publisher(&self, publisher: Arc<dyn RealtimePublisher>) {
        *self
            .inner
            .publisher
            .write()
            .expect("notification publisher lock poisoned") = Some(publisher);
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    /// Number of unread records, counted from the live collection.
    pub fn unread_count(&self) -> usize {
        self.read_state(|state| state.notifications.iter().filter(|n| !n.is_read).count())
    }

    pub fn len(&self) -> usize {
        self.read_state(|state| state.notifications.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<NotificationRecord> {
        self.read_state(|state| state.notifications.clone())
    }

    pub fn get(&self, id: &str) -> Option<NotificationRecord> {
        self.read_state(|state| state.notifications.iter().find(|n| n.id == id).cloned())
    }

    pub fn loading(&self) -> bool {
        self.read_state(|state| state.pending > 0)
    }

    pub fn last_error(&self) -> Option<String> {
        self.read_state(|state| state.error.clone())
    }

    // -----------------------------------------------------------------------
    // Remote-backed operations
    // -----------------------------------------------------------------------

    /// Replace the collection with the backend list. On failure the current
    /// collection is kept and the error flag is set.
    pub async fn fetch_all(&self) -> Result<usize, ApiError> {
        let api = self.inner.api.clone();
        let records = self.track(async move { api.list_notifications().await }).await?;
        let count = records.len();
        self.mutate(|state| {
            state.notifications = records;
            true
        });
        tracing::debug!("loaded {count} notifications");
        Ok(count)
    }

    /// Persist a new notification. Always inserts something: the canonical
    /// record on success, a `local-` record otherwise.
    pub async fn create(&self, draft: NotificationDraft) -> NotificationRecord {
        let api = self.inner.api.clone();
        let remote_draft = draft.clone();
        let record = match self
            .track(async move { api.create_notification(&remote_draft).await })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("could not save notification remotely, keeping it local: {e}");
                draft.into_local()
            }
        };
        self.insert(record.clone());
        record
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        let api = self.inner.api.clone();
        let remote_id = id.to_string();
        self.track(async move { api.mark_read(&remote_id).await }).await?;
        self.set_read(id, true);
        self.broadcast(MessageKind::NotificationRead, json!({ "id": id }));
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        let api = self.inner.api.clone();
        self.track(async move { api.mark_all_read().await }).await?;
        self.set_all_read(true);
        self.broadcast(MessageKind::NotificationRead, json!({ "all": true }));
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let api = self.inner.api.clone();
        let remote_id = id.to_string();
        self.track(async move { api.delete_notification(&remote_id).await })
            .await?;
        self.remove(id);
        self.broadcast(MessageKind::NotificationDelete, json!({ "id": id }));
        Ok(())
    }

    /// Backend's unread count; 0 with the error flag set when unavailable.
    pub async fn fetch_unread_count(&self) -> usize {
        let api = self.inner.api.clone();
        self.track(async move { api.unread_count().await })
            .await
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Local mutations (no backend round trip)
    // -----------------------------------------------------------------------

    /// Prepend unless a record with the same id is already present.
    pub fn insert(&self, record: NotificationRecord) -> bool {
        self.mutate(|state| {
            if state.notifications.iter().any(|n| n.id == record.id) {
                return false;
            }
            state.notifications.insert(0, record);
            true
        })
    }

    pub fn set_read(&self, id: &str, is_read: bool) -> bool {
        self.mutate(|state| match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(found) if found.is_read != is_read => {
                found.is_read = is_read;
                true
            }
            _ => false,
        })
    }

    pub fn set_all_read(&self, is_read: bool) -> bool {
        self.mutate(|state| {
            let mut changed = false;
            for record in state.notifications.iter_mut().filter(|n| n.is_read != is_read) {
                record.is_read = is_read;
                changed = true;
            }
            changed
        })
    }

    pub fn remove(&self, id: &str) -> bool {
        self.mutate(|state| {
            let before = state.notifications.len();
            state.notifications.retain(|n| n.id != id);
            state.notifications.len() != before
        })
    }

    /// Drop every record and the error flag (logout).
    pub fn clear(&self) {
        self.mutate(|state| {
            let had_records = !state.notifications.is_empty();
            state.notifications.clear();
            state.error = None;
            had_records
        });
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn read_state<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let guard = self
            .inner
            .state
            .read()
            .expect("notification store lock poisoned");
        f(&guard)
    }

    /// Apply `f` under the write lock; announce the new counts when it
    /// reports a change.
    fn mutate(&self, f: impl FnOnce(&mut StoreState) -> bool) -> bool {
        let (changed, total, unread) = {
            let mut guard = self
                .inner
                .state
                .write()
                .expect("notification store lock poisoned");
            let changed = f(&mut guard);
            let unread = guard.notifications.iter().filter(|n| !n.is_read).count();
            (changed, guard.notifications.len(), unread)
        };
        if changed {
            if let Some(bus) = &self.inner.bus {
                bus.emit(ClientEvent::NotificationsChanged { total, unread });
            }
        }
        changed
    }

    /// Run a backend call with the loading flag raised; record the error
    /// message on failure.
    async fn track<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        {
            let mut guard = self
                .inner
                .state
                .write()
                .expect("notification store lock poisoned");
            guard.pending += 1;
            guard.error = None;
        }

        let result = call.await;

        let mut guard = self
            .inner
            .state
            .write()
            .expect("notification store lock poisoned");
        guard.pending = guard.pending.saturating_sub(1);
        if let Err(e) = &result {
            guard.error = Some(e.to_string());
        }
        result
    }

    fn broadcast(&self, kind: MessageKind, data: serde_json::Value) {
        let publisher = self
            .inner
            .publisher
            .read()
            .expect("notification publisher lock poisoned")
            .clone();
        let Some(publisher) = publisher else {
            return;
        };
        if !publisher.is_connected() {
            return;
        }
        if let Err(e) = publisher.publish(kind, data) {
            tracing::debug!("could not broadcast {kind} to other sessions: {e}");
        }
    }
}
