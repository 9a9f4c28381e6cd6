//! Notification records and the in-memory store that mirrors the backend.

mod model;
mod store;

pub use model::{
    local_id, NotificationDraft, NotificationKind, NotificationRecord, RelatedEntityType,
    LOCAL_ID_PREFIX,
};
pub use store::{NotificationStore, RealtimePublisher};
