use chrono::NaiveDate;
use tfn_schemas::{AttendanceRecord, BillEntry, NewBill, Paise, Result, SubscriberId, TiffinError};

use crate::NO_ATTENDANCE_IN_RANGE;

/// Copy ledger rows into an owned bill snapshot.
///
/// `rows` must already be restricted to the subscriber and window and
/// sorted date-ascending. An empty window is NotFound.
pub fn build_snapshot(
    subscriber_id: &SubscriberId,
    subscriber_name: Option<&str>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    rows: &[AttendanceRecord],
    generated_by: &str,
) -> Result<NewBill> {
    let Some(latest) = rows.last() else {
        return Err(TiffinError::not_found(NO_ATTENDANCE_IN_RANGE));
    };

    let entries: Vec<BillEntry> = rows
        .iter()
        .map(|r| BillEntry {
            date: r.date,
            meal_type: r.meal_type,
            price: r.price,
        })
        .collect();
    let total = Paise::checked_sum(entries.iter().map(|e| e.price)).ok_or_else(|| {
        TiffinError::validation("total", "Bill total exceeds the supported amount range")
    })?;

    let subscriber_name = subscriber_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(latest.subscriber_name.as_str())
        .to_string();

    Ok(NewBill {
        subscriber_id: subscriber_id.clone(),
        subscriber_name,
        start_date,
        end_date,
        total_meals: entries.len() as u32,
        total,
        entries,
        generated_by: generated_by.to_string(),
    })
}
