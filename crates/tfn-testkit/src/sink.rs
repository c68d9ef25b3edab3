use std::sync::Mutex;

use async_trait::async_trait;
use tfn_schemas::{NewNotification, NotificationSink};

/// Captures emitted notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<NewNotification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<NewNotification> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn titles(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit(&self, notification: NewNotification) {
        self.seen
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(notification);
    }
}
