use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const DEFAULT_MAX_NOTIFICATIONS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    UploadFailed,
    SaveFailed,
}

#[derive(Clone, Debug)]
pub struct NotificationItem {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at_ms: i64,
    pub read: bool,
}

impl NotificationItem {
    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::UploadFailed, "Image upload failed", message)
    }

    pub fn save_failed(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::SaveFailed, "Changes not saved", message)
    }

    fn new(kind: NotificationKind, title: &str, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.to_string(),
            message: message.into(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
            read: false,
        }
    }
}

/// Shared, bounded queue of user-visible notifications.
#[derive(Clone, Debug)]
pub struct Notifications {
    items: Arc<Mutex<Vec<NotificationItem>>>,
    max: usize,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NOTIFICATIONS)
    }
}

impl Notifications {
    pub fn new(max: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            max: max.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<NotificationItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, item: NotificationItem) {
        let mut items = self.lock();
        items.push(item);
        if items.len() > self.max {
            let overflow = items.len() - self.max;
            items.drain(0..overflow);
        }
    }

    pub fn items(&self) -> Vec<NotificationItem> {
        self.lock().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().iter().filter(|item| !item.read).count()
    }

    pub fn mark_all_read(&self) {
        for item in self.lock().iter_mut() {
            item.read = true;
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationItem, NotificationKind, Notifications};

    #[test]
    fn push_drops_oldest_beyond_capacity() {
        let notifications = Notifications::new(2);
        notifications.push(NotificationItem::upload_failed("one"));
        notifications.push(NotificationItem::upload_failed("two"));
        notifications.push(NotificationItem::save_failed("three"));

        let items = notifications.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].message, "two");
        assert_eq!(items[1].kind, NotificationKind::SaveFailed);
    }

    #[test]
    fn mark_all_read_resets_unread_count() {
        let notifications = Notifications::default();
        notifications.push(NotificationItem::upload_failed("x"));
        assert_eq!(notifications.unread_count(), 1);
        notifications.mark_all_read();
        assert_eq!(notifications.unread_count(), 0);
        notifications.clear();
        assert!(notifications.items().is_empty());
    }

    #[test]
    fn clones_share_the_same_queue() {
        let notifications = Notifications::default();
        let handle = notifications.clone();
        handle.push(NotificationItem::save_failed("offline"));
        assert_eq!(notifications.unread_count(), 1);
    }
}
