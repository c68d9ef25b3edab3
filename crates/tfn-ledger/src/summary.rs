//! Read-only aggregations over ledger rows. Pure functions; callers fetch.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tfn_schemas::{AttendanceRecord, DateRange, MealType, Page, Paise, SubscriberId};

/// Cap on subscriber groups in a range summary.
pub const TOP_SUBSCRIBERS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealBreakdown {
    pub meal_type: MealType,
    pub count: u64,
    pub total: Paise,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub meal_type: Option<MealType>,
    pub total_meals: u64,
    pub total: Paise,
    pub average: Paise,
    /// Only meal types that occurred, in breakfast/lunch/dinner order.
    pub by_meal: Vec<MealBreakdown>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Subscriber,
    MealType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryGroup {
    pub key: String,
    /// Latest display name, subscriber grouping only.
    pub name: Option<String>,
    pub count: u64,
    pub total: Paise,
    pub average: Paise,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSummary {
    pub range: DateRange,
    pub meal_type: Option<MealType>,
    pub group_by: GroupBy,
    pub total_meals: u64,
    pub total: Paise,
    pub average: Paise,
    pub unique_subscribers: u64,
    pub groups: Vec<SummaryGroup>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeCounters {
    pub visits: u64,
    pub spend: Paise,
    pub breakfast: u64,
    pub lunch: u64,
    pub dinner: u64,
    pub first_visit: Option<NaiveDate>,
    pub last_visit: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberHistory {
    pub subscriber_id: SubscriberId,
    pub records: Page<AttendanceRecord>,
    pub lifetime: LifetimeCounters,
}

pub fn daily(date: NaiveDate, meal_type: Option<MealType>, rows: &[AttendanceRecord]) -> DailySummary {
    let total: Paise = rows.iter().map(|r| r.price).sum();
    let total_meals = rows.len() as u64;
    let by_meal = MealType::ALL
        .iter()
        .filter_map(|m| {
            let (count, total) = rows
                .iter()
                .filter(|r| r.meal_type == *m)
                .fold((0u64, Paise::ZERO), |(c, t), r| (c + 1, t + r.price));
            (count > 0).then_some(MealBreakdown {
                meal_type: *m,
                count,
                total,
            })
        })
        .collect();
    DailySummary {
        date,
        meal_type,
        total_meals,
        total,
        average: Paise::average(total, total_meals),
        by_meal,
    }
}

pub fn range(
    range: DateRange,
    meal_type: Option<MealType>,
    group_by: GroupBy,
    rows: &[AttendanceRecord],
) -> RangeSummary {
    let total: Paise = rows.iter().map(|r| r.price).sum();
    let total_meals = rows.len() as u64;

    let mut buckets: HashMap<String, SummaryGroup> = HashMap::new();
    for r in rows {
        let key = match group_by {
            GroupBy::Subscriber => r.subscriber_id.to_string(),
            GroupBy::MealType => r.meal_type.to_string(),
        };
        let g = buckets.entry(key.clone()).or_insert_with(|| SummaryGroup {
            key,
            name: None,
            count: 0,
            total: Paise::ZERO,
            average: Paise::ZERO,
        });
        g.count += 1;
        g.total += r.price;
        if group_by == GroupBy::Subscriber {
            // rows arrive date-ascending, so the last write is the latest name
            g.name = Some(r.subscriber_name.clone());
        }
    }

    let unique_subscribers = {
        let mut ids: Vec<&SubscriberId> = rows.iter().map(|r| &r.subscriber_id).collect();
        ids.sort();
        ids.dedup();
        ids.len() as u64
    };

    let mut groups: Vec<SummaryGroup> = buckets
        .into_values()
        .map(|mut g| {
            g.average = Paise::average(g.total, g.count);
            g
        })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    if group_by == GroupBy::Subscriber {
        groups.truncate(TOP_SUBSCRIBERS);
    }

    RangeSummary {
        range,
        meal_type,
        group_by,
        total_meals,
        total,
        average: Paise::average(total, total_meals),
        unique_subscribers,
        groups,
    }
}

pub fn lifetime(rows: &[AttendanceRecord]) -> LifetimeCounters {
    let mut c = LifetimeCounters::default();
    for r in rows {
        c.visits += 1;
        c.spend += r.price;
        match r.meal_type {
            MealType::Breakfast => c.breakfast += 1,
            MealType::Lunch => c.lunch += 1,
            MealType::Dinner => c.dinner += 1,
        }
        c.first_visit = Some(c.first_visit.map_or(r.date, |d| d.min(r.date)));
        c.last_visit = Some(c.last_visit.map_or(r.date, |d| d.max(r.date)));
    }
    c
}
