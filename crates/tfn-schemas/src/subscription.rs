use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Paise, Result, SubscriberId, TiffinError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Weekly,
    Monthly,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Weekly => "weekly",
            Plan::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "weekly" => Ok(Plan::Weekly),
            "monthly" => Ok(Plan::Monthly),
            other => Err(TiffinError::validation(
                "plan",
                format!("unknown plan '{other}'"),
            )),
        }
    }

    pub fn default_meals_included(&self) -> u32 {
        match self {
            Plan::Weekly => 7,
            Plan::Monthly => 30,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "active" => Ok(SubscriptionStatus::Active),
            "paused" => Ok(SubscriptionStatus::Paused),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(TiffinError::validation(
                "status",
                format!("unknown subscription status '{other}'"),
            )),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Expired | SubscriptionStatus::Cancelled
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub subscriber_id: SubscriberId,
    pub subscriber_name: String,
    pub plan: Plan,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: Paise,
    pub meals_included: u32,
    pub status: SubscriptionStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInput {
    pub subscriber_id: String,
    pub subscriber_name: String,
    pub plan: Plan,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price_paise: i64,
    #[serde(default)]
    pub meals_included: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    pub subscriber_id: SubscriberId,
    pub subscriber_name: String,
    pub plan: Plan,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: Paise,
    pub meals_included: u32,
    pub created_by: String,
}

/// Edit of a live subscription's terms. Absent fields keep their current
/// value; status is changed through its own operation, never here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionPatch {
    #[serde(default)]
    pub subscriber_name: Option<String>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub price_paise: Option<i64>,
    #[serde(default)]
    pub meals_included: Option<u32>,
}

impl SubscriptionPatch {
    pub fn is_empty(&self) -> bool {
        self.subscriber_name.is_none()
            && self.plan.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.price_paise.is_none()
            && self.meals_included.is_none()
    }
}

/// The editable columns of a subscription, written together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTerms {
    pub subscriber_name: String,
    pub plan: Plan,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: Paise,
    pub meals_included: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    pub subscriber_id: Option<SubscriberId>,
    pub status: Option<SubscriptionStatus>,
    pub plan: Option<Plan>,
}

impl SubscriptionFilter {
    pub fn matches(&self, s: &Subscription) -> bool {
        self.subscriber_id
            .as_ref()
            .map_or(true, |id| id == &s.subscriber_id)
            && self.status.map_or(true, |st| st == s.status)
            && self.plan.map_or(true, |p| p == s.plan)
    }
}
