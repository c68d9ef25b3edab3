//! Process-local map of subscriber -> live push channels.
//!
//! Guarded by a std `RwLock`. Never held across an await; [`ChannelGuard`]
//! unregisters synchronously from `Drop`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tfn_schemas::{Notification, SubscriberId};
use tokio::sync::mpsc;
use tracing::debug;

/// What a channel receives. Shared so one notification fans out without copies.
pub type PushFrame = Arc<Notification>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

#[derive(Default)]
struct Inner {
    by_subscriber: HashMap<SubscriberId, HashMap<ChannelId, mpsc::Sender<PushFrame>>>,
    owner: HashMap<ChannelId, SubscriberId>,
}

#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<RwLock<Inner>>,
    next_id: Arc<AtomicU64>,
    buffer: usize,
}

impl ChannelRegistry {
    /// `buffer` is the per-channel queue depth used by [`register`](Self::register).
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            buffer: buffer.max(1),
        }
    }

    // Every mutation is one insert/remove pair, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Add an existing sender for `subscriber`. Multiple handles per
    /// subscriber are normal (several devices or tabs).
    pub fn register_sender(
        &self,
        subscriber: SubscriberId,
        sender: mpsc::Sender<PushFrame>,
    ) -> ChannelId {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.write();
        inner
            .by_subscriber
            .entry(subscriber.clone())
            .or_default()
            .insert(id, sender);
        inner.owner.insert(id, subscriber.clone());
        drop(inner);
        debug!(channel = %id, subscriber = %subscriber, "channel/registered");
        id
    }

    /// Create a bounded channel for `subscriber`. Dropping the guard
    /// unregisters it.
    pub fn register(&self, subscriber: SubscriberId) -> (ChannelGuard, mpsc::Receiver<PushFrame>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.register_sender(subscriber, tx);
        (
            ChannelGuard {
                registry: self.clone(),
                id,
            },
            rx,
        )
    }

    /// Remove a handle from whichever subscriber holds it. Returns false if
    /// it was already gone.
    pub fn unregister(&self, id: ChannelId) -> bool {
        let mut inner = self.write();
        let Some(subscriber) = inner.owner.remove(&id) else {
            return false;
        };
        if let Some(channels) = inner.by_subscriber.get_mut(&subscriber) {
            channels.remove(&id);
            if channels.is_empty() {
                inner.by_subscriber.remove(&subscriber);
            }
        }
        drop(inner);
        debug!(channel = %id, subscriber = %subscriber, "channel/unregistered");
        true
    }

    /// Point-in-time copy; the lock is released before anyone sends.
    pub fn senders_for(&self, subscriber: &SubscriberId) -> Vec<(ChannelId, mpsc::Sender<PushFrame>)> {
        self.read()
            .by_subscriber
            .get(subscriber)
            .map(|m| m.iter().map(|(id, tx)| (*id, tx.clone())).collect())
            .unwrap_or_default()
    }

    pub fn channel_count(&self, subscriber: &SubscriberId) -> usize {
        self.read()
            .by_subscriber
            .get(subscriber)
            .map_or(0, HashMap::len)
    }

    pub fn total_channels(&self) -> usize {
        self.read().owner.len()
    }
}

/// Keeps a channel registered for as long as it lives.
pub struct ChannelGuard {
    registry: ChannelRegistry,
    id: ChannelId,
}

impl ChannelGuard {
    pub fn id(&self) -> ChannelId {
        self.id
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
