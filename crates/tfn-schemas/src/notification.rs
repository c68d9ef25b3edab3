use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, SubscriberId, TiffinError, Validator};

pub const TITLE_MAX_CHARS: usize = 100;
pub const MESSAGE_MAX_CHARS: usize = 500;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Order,
    Attendance,
    Bill,
    Subscription,
    Menu,
    #[default]
    General,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Order => "order",
            NotificationKind::Attendance => "attendance",
            NotificationKind::Bill => "bill",
            NotificationKind::Subscription => "subscription",
            NotificationKind::Menu => "menu",
            NotificationKind::General => "general",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "order" => Ok(NotificationKind::Order),
            "attendance" => Ok(NotificationKind::Attendance),
            "bill" => Ok(NotificationKind::Bill),
            "subscription" => Ok(NotificationKind::Subscription),
            "menu" => Ok(NotificationKind::Menu),
            "general" => Ok(NotificationKind::General),
            other => Err(TiffinError::validation(
                "kind",
                format!("unknown notification kind '{other}'"),
            )),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed back-reference from a notification to the entity that caused it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RelatedEntity {
    Order(Uuid),
    Attendance(Uuid),
    Bill(Uuid),
    Subscription(Uuid),
    Meal(Uuid),
}

impl RelatedEntity {
    pub fn kind_str(&self) -> &'static str {
        match self {
            RelatedEntity::Order(_) => "order",
            RelatedEntity::Attendance(_) => "attendance",
            RelatedEntity::Bill(_) => "bill",
            RelatedEntity::Subscription(_) => "subscription",
            RelatedEntity::Meal(_) => "meal",
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            RelatedEntity::Order(id)
            | RelatedEntity::Attendance(id)
            | RelatedEntity::Bill(id)
            | RelatedEntity::Subscription(id)
            | RelatedEntity::Meal(id) => id,
        }
    }

    /// Rebuild from the two stored columns. Both present or both absent.
    pub fn from_parts(kind: Option<&str>, id: Option<Uuid>) -> Result<Option<Self>> {
        let (kind, id) = match (kind, id) {
            (None, None) => return Ok(None),
            (Some(k), Some(id)) => (k, id),
            _ => {
                return Err(TiffinError::Internal(anyhow::anyhow!(
                    "related entity kind/id stored half-populated"
                )))
            }
        };
        let r = match kind {
            "order" => RelatedEntity::Order(id),
            "attendance" => RelatedEntity::Attendance(id),
            "bill" => RelatedEntity::Bill(id),
            "subscription" => RelatedEntity::Subscription(id),
            "meal" => RelatedEntity::Meal(id),
            other => {
                return Err(TiffinError::Internal(anyhow::anyhow!(
                    "unknown related entity kind '{other}'"
                )))
            }
        };
        Ok(Some(r))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub subscriber_id: SubscriberId,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub related: Option<RelatedEntity>,
    #[serde(default)]
    pub sent_by: Option<String>,
}

impl NewNotification {
    pub fn new(
        subscriber_id: SubscriberId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subscriber_id,
            title: title.into(),
            message: message.into(),
            kind,
            related: None,
            sent_by: None,
        }
    }

    pub fn related(mut self, related: RelatedEntity) -> Self {
        self.related = Some(related);
        self
    }

    pub fn sent_by(mut self, actor: impl Into<String>) -> Self {
        self.sent_by = Some(actor.into());
        self
    }

    /// Trims title/message in place and checks their bounds.
    pub fn normalize(&mut self) -> Result<()> {
        self.title = self.title.trim().to_string();
        self.message = self.message.trim().to_string();
        let mut v = Validator::new();
        let tl = self.title.chars().count();
        v.check(
            (1..=TITLE_MAX_CHARS).contains(&tl),
            "title",
            "Title must be between 1 and 100 characters",
        );
        let ml = self.message.chars().count();
        v.check(
            (1..=MESSAGE_MAX_CHARS).contains(&ml),
            "message",
            "Message must be between 1 and 500 characters",
        );
        v.finish("Validation failed")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub subscriber_id: SubscriberId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub related: Option<RelatedEntity>,
    pub sent_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Anything that can take a domain event and turn it into a notification.
///
/// Infallible on purpose: delivery problems are the sink's to log, never the
/// business operation's to fail on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, notification: NewNotification);
}
