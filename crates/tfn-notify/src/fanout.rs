use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tfn_schemas::{
    Identity, NewNotification, Notification, NotificationSink, Result, SubscriberId, TiffinError,
    Validator,
};
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::{ChannelId, ChannelRegistry};
use crate::store::NotificationStore;

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitReport {
    pub notification: Notification,
    /// Channels that accepted the push.
    pub delivered: usize,
    /// Channels that timed out or were closed.
    pub failed: usize,
}

/// Persist-then-push notification service.
#[derive(Clone)]
pub struct Fanout {
    store: Arc<dyn NotificationStore>,
    registry: ChannelRegistry,
    push_timeout: Duration,
}

impl Fanout {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        registry: ChannelRegistry,
        push_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            push_timeout,
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// Persist first, then push to every live channel of the subscriber and
    /// report the outcome. Channels are pushed concurrently, so one slow
    /// channel costs at most one `push_timeout`. Push failures never undo the
    /// write and never surface as errors; zero channels is not an error.
    pub async fn send(&self, mut new: NewNotification) -> Result<EmitReport> {
        new.normalize()?;
        let stored = self.persist(new).await?;
        let (delivered, failed) = self.push(&stored).await;
        Ok(EmitReport {
            notification: stored,
            delivered,
            failed,
        })
    }

    /// Every entry is validated before anything is written. All pushes for
    /// the batch run together under a single timeout window.
    pub async fn send_batch(&self, mut batch: Vec<NewNotification>) -> Result<Vec<EmitReport>> {
        if batch.is_empty() {
            return Err(TiffinError::validation(
                "notifications",
                "At least one notification is required",
            ));
        }
        let mut v = Validator::new();
        for (i, n) in batch.iter_mut().enumerate() {
            if let Err(e) = n.normalize() {
                if let Some(other) = v.absorb(&format!("notifications[{i}]"), e) {
                    return Err(other);
                }
            }
        }
        v.finish("Validation failed")?;

        let mut stored = Vec::with_capacity(batch.len());
        for n in batch {
            stored.push(self.persist(n).await?);
        }
        let outcomes = join_all(stored.iter().map(|n| self.push(n))).await;
        Ok(stored
            .into_iter()
            .zip(outcomes)
            .map(|(notification, (delivered, failed))| EmitReport {
                notification,
                delivered,
                failed,
            })
            .collect())
    }

    async fn persist(&self, new: NewNotification) -> Result<Notification> {
        let stored = self.store.insert_notification(new).await?;
        info!(
            id = %stored.id,
            subscriber = %stored.subscriber_id,
            kind = %stored.kind,
            "notification/persisted"
        );
        Ok(stored)
    }

    /// Push on a background task. The caller only waits for the write.
    fn push_detached(&self, n: Notification) {
        if self.registry.channel_count(&n.subscriber_id) == 0 {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            let (delivered, failed) = this.push(&n).await;
            debug!(notification = %n.id, delivered, failed, "notification/pushed");
        });
    }

    async fn push(&self, n: &Notification) -> (usize, usize) {
        let senders = self.registry.senders_for(&n.subscriber_id);
        if senders.is_empty() {
            return (0, 0);
        }

        let frame = Arc::new(n.clone());
        let timeout = self.push_timeout;
        let attempts = senders.into_iter().map(|(id, tx)| {
            let frame = Arc::clone(&frame);
            async move { (id, tx.send_timeout(frame, timeout).await) }
        });

        let mut delivered = 0;
        let mut dead: Vec<ChannelId> = Vec::new();
        let mut failed = 0;
        for (id, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => delivered += 1,
                Err(SendTimeoutError::Timeout(_)) => {
                    failed += 1;
                    warn!(channel = %id, notification = %n.id, "notification/push_timeout");
                }
                Err(SendTimeoutError::Closed(_)) => {
                    failed += 1;
                    dead.push(id);
                    warn!(channel = %id, notification = %n.id, "notification/push_closed");
                }
            }
        }
        for id in dead {
            self.registry.unregister(id);
        }
        (delivered, failed)
    }

    // -----------------------------------------------------------------------
    // Operator entry points
    // -----------------------------------------------------------------------

    pub async fn notify(&self, actor: &Identity, new: NewNotification) -> Result<EmitReport> {
        actor.require_owner()?;
        self.send(new.sent_by(actor.actor())).await
    }

    pub async fn notify_batch(
        &self,
        actor: &Identity,
        batch: Vec<NewNotification>,
    ) -> Result<Vec<EmitReport>> {
        actor.require_owner()?;
        let actor_id = actor.actor();
        self.send_batch(batch.into_iter().map(|n| n.sent_by(actor_id.clone())).collect())
            .await
    }

    // -----------------------------------------------------------------------
    // Inbox (pull side)
    // -----------------------------------------------------------------------

    /// Newest first. `limit` defaults to 50 and is capped at 100.
    pub async fn list(
        &self,
        actor: &Identity,
        subscriber: &SubscriberId,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>> {
        actor.require_self_or_owner(subscriber)?;
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        self.store.list_notifications(subscriber, limit).await
    }

    pub async fn unread_count(&self, actor: &Identity, subscriber: &SubscriberId) -> Result<u64> {
        actor.require_self_or_owner(subscriber)?;
        self.store.unread_count(subscriber).await
    }

    /// Idempotent: re-marking a read notification returns it unchanged.
    pub async fn mark_read(&self, actor: &Identity, id: Uuid) -> Result<Notification> {
        let existing = self
            .store
            .get_notification(id)
            .await?
            .ok_or_else(|| TiffinError::not_found(format!("notification {id} not found")))?;
        actor.require_self_or_owner(&existing.subscriber_id)?;
        if existing.read {
            return Ok(existing);
        }
        self.store
            .mark_read(id)
            .await?
            .ok_or_else(|| TiffinError::not_found(format!("notification {id} not found")))
    }

    pub async fn mark_all_read(&self, actor: &Identity, subscriber: &SubscriberId) -> Result<u64> {
        actor.require_self_or_owner(subscriber)?;
        let changed = self.store.mark_all_read(subscriber).await?;
        info!(subscriber = %subscriber, changed, "notification/mark_all_read");
        Ok(changed)
    }
}

/// Business paths emit through here: the write is awaited, delivery is not.
#[async_trait]
impl NotificationSink for Fanout {
    async fn emit(&self, mut notification: NewNotification) {
        let subscriber = notification.subscriber_id.clone();
        let persisted = match notification.normalize() {
            Ok(()) => self.persist(notification).await,
            Err(e) => Err(e),
        };
        match persisted {
            Ok(stored) => self.push_detached(stored),
            Err(e) => warn!(subscriber = %subscriber, error = %e, "notification/emit_failed"),
        }
    }
}
