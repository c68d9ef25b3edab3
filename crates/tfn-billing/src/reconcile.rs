use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tfn_schemas::{AttendanceRecord, Bill, BillEntry, MealType, Paise};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepricedEntry {
    pub entry: BillEntry,
    pub live_price: Paise,
}

/// Read-time view of a bill against the current ledger.
///
/// `snapshot_*` is the contractual figure and never changes. `active_*`
/// counts only snapshot entries whose ledger row still exists, at the
/// snapshot price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillReconciliation {
    pub bill_id: Uuid,
    pub bill_number: String,
    pub snapshot_total: Paise,
    pub snapshot_meals: u32,
    pub active_total: Paise,
    pub active_meals: u32,
    /// Snapshot entries with no live ledger row, sorted.
    pub removed: Vec<BillEntry>,
    /// Still present but now priced differently. Informational only.
    pub repriced: Vec<RepricedEntry>,
}

impl BillReconciliation {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty() && self.repriced.is_empty()
    }
}

/// Deterministic: same bill + same live rows => same report.
///
/// `live` may contain rows for other subscribers or outside the window; they
/// are ignored. Matching is by (date, meal type).
pub fn reconcile(bill: &Bill, live: &[AttendanceRecord]) -> BillReconciliation {
    let live_by_key: HashMap<(NaiveDate, MealType), Paise> = live
        .iter()
        .filter(|r| r.subscriber_id == bill.subscriber_id)
        .map(|r| ((r.date, r.meal_type), r.price))
        .collect();

    let mut active_total = Paise::ZERO;
    let mut active_meals = 0u32;
    let mut removed = Vec::new();
    let mut repriced = Vec::new();

    for entry in &bill.entries {
        match live_by_key.get(&(entry.date, entry.meal_type)) {
            None => removed.push(entry.clone()),
            Some(live_price) => {
                active_total += entry.price;
                active_meals += 1;
                if *live_price != entry.price {
                    repriced.push(RepricedEntry {
                        entry: entry.clone(),
                        live_price: *live_price,
                    });
                }
            }
        }
    }

    removed.sort();
    repriced.sort();

    BillReconciliation {
        bill_id: bill.id,
        bill_number: bill.bill_number.clone(),
        snapshot_total: bill.total,
        snapshot_meals: bill.total_meals,
        active_total,
        active_meals,
        removed,
        repriced,
    }
}
