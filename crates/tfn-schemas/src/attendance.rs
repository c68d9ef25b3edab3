use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DateRange, MealType, Paise, SubscriberId};

/// Identity tuple of an attendance fact. At most one record per key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttendanceKey {
    pub subscriber_id: SubscriberId,
    pub meal_type: MealType,
    pub date: NaiveDate,
}

/// Caller-supplied attendance entry, not yet validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceInput {
    pub subscriber_id: String,
    pub subscriber_name: String,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub price_paise: i64,
}

/// Validated row ready for the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttendance {
    pub subscriber_id: SubscriberId,
    pub subscriber_name: String,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub price: Paise,
    pub recorded_by: String,
}

impl NewAttendance {
    pub fn key(&self) -> AttendanceKey {
        AttendanceKey {
            subscriber_id: self.subscriber_id.clone(),
            meal_type: self.meal_type,
            date: self.date,
        }
    }

    /// Human label used in conflict reports: `"{name} - {meal} - {date}"`.
    pub fn label(&self) -> String {
        format!("{} - {} - {}", self.subscriber_name, self.meal_type, self.date)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub subscriber_id: SubscriberId,
    pub subscriber_name: String,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub price: Paise,
    pub recorded_by: String,
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn key(&self) -> AttendanceKey {
        AttendanceKey {
            subscriber_id: self.subscriber_id.clone(),
            meal_type: self.meal_type,
            date: self.date,
        }
    }

    pub fn label(&self) -> String {
        format!("{} - {} - {}", self.subscriber_name, self.meal_type, self.date)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceFilter {
    pub subscriber_id: Option<SubscriberId>,
    pub meal_type: Option<MealType>,
    pub range: DateRange,
}

impl AttendanceFilter {
    pub fn matches(&self, r: &AttendanceRecord) -> bool {
        self.subscriber_id
            .as_ref()
            .map_or(true, |s| s == &r.subscriber_id)
            && self.meal_type.map_or(true, |m| m == r.meal_type)
            && self.range.contains(r.date)
    }
}
