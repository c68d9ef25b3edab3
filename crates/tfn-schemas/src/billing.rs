use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MealType, Paise, Result, SubscriberId, TiffinError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Generated,
    Sent,
    Paid,
    Overdue,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Generated => "generated",
            BillStatus::Sent => "sent",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "generated" => Ok(BillStatus::Generated),
            "sent" => Ok(BillStatus::Sent),
            "paid" => Ok(BillStatus::Paid),
            "overdue" => Ok(BillStatus::Overdue),
            other => Err(TiffinError::validation(
                "status",
                format!("unknown bill status '{other}'"),
            )),
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value copy of one ledger row at generation time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BillEntry {
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub price: Paise,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub bill_number: String,
    pub subscriber_id: SubscriberId,
    pub subscriber_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_meals: u32,
    pub total: Paise,
    pub entries: Vec<BillEntry>,
    pub status: BillStatus,
    pub generated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot handed to the store; the store assigns id + number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBill {
    pub subscriber_id: SubscriberId,
    pub subscriber_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_meals: u32,
    pub total: Paise,
    pub entries: Vec<BillEntry>,
    pub generated_by: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillFilter {
    pub subscriber_id: Option<SubscriberId>,
    pub status: Option<BillStatus>,
}

impl BillFilter {
    pub fn matches(&self, b: &Bill) -> bool {
        self.subscriber_id
            .as_ref()
            .map_or(true, |s| s == &b.subscriber_id)
            && self.status.map_or(true, |st| st == b.status)
    }
}
