use async_trait::async_trait;
use tfn_schemas::{NewNotification, Notification, Result, SubscriberId};
use uuid::Uuid;

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Stored unread.
    async fn insert_notification(&self, n: NewNotification) -> Result<Notification>;

    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>>;

    /// Newest first, at most `limit`.
    async fn list_notifications(
        &self,
        subscriber: &SubscriberId,
        limit: u32,
    ) -> Result<Vec<Notification>>;

    async fn unread_count(&self, subscriber: &SubscriberId) -> Result<u64>;

    /// Idempotent. `None` only if the notification does not exist.
    async fn mark_read(&self, id: Uuid) -> Result<Option<Notification>>;

    /// Number of rows that flipped from unread to read.
    async fn mark_all_read(&self, subscriber: &SubscriberId) -> Result<u64>;
}
