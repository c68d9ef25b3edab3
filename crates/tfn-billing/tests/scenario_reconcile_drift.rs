//! Snapshot construction + read-time reconciliation, no store involved.

use chrono::{NaiveDate, TimeZone, Utc};
use tfn_billing::{build_snapshot, reconcile, NO_ATTENDANCE_IN_RANGE};
use tfn_schemas::{
    AttendanceRecord, Bill, BillStatus, MealType, NewBill, Paise, SubscriberId, TiffinError,
};
use uuid::Uuid;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn sid() -> SubscriberId {
    SubscriberId::parse("9998887777").unwrap()
}

fn row(meal: MealType, date: NaiveDate, price: i64) -> AttendanceRecord {
    AttendanceRecord {
        id: Uuid::new_v4(),
        subscriber_id: sid(),
        subscriber_name: "Asha".to_string(),
        meal_type: meal,
        date,
        price: Paise(price),
        recorded_by: "9000000001".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn january(n: u32) -> Vec<AttendanceRecord> {
    (1..=n)
        .map(|day| row(MealType::Lunch, d("2024-01-01") + chrono::Days::new(u64::from(day - 1)), 5000))
        .collect()
}

fn as_bill(nb: NewBill) -> Bill {
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    Bill {
        id: Uuid::new_v4(),
        bill_number: "BILL000001".to_string(),
        subscriber_id: nb.subscriber_id,
        subscriber_name: nb.subscriber_name,
        start_date: nb.start_date,
        end_date: nb.end_date,
        total_meals: nb.total_meals,
        total: nb.total,
        entries: nb.entries,
        status: BillStatus::Generated,
        generated_by: nb.generated_by,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn snapshot_totals_equal_sum_of_entries() {
    let rows = january(20);
    let nb = build_snapshot(&sid(), None, d("2024-01-01"), d("2024-01-31"), &rows, "op").unwrap();
    assert_eq!(nb.total_meals, 20);
    assert_eq!(nb.total, Paise(100_000));
    assert_eq!(nb.total, nb.entries.iter().map(|e| e.price).sum::<Paise>());
    assert_eq!(nb.subscriber_name, "Asha");
}

#[test]
fn empty_window_is_not_found() {
    let err = build_snapshot(&sid(), None, d("2024-01-01"), d("2024-01-31"), &[], "op").unwrap_err();
    match err {
        TiffinError::NotFound(msg) => assert_eq!(msg, NO_ATTENDANCE_IN_RANGE),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn explicit_name_overrides_ledger_name() {
    let rows = january(1);
    let nb = build_snapshot(&sid(), Some("  Asha Kumar "), d("2024-01-01"), d("2024-01-01"), &rows, "op")
        .unwrap();
    assert_eq!(nb.subscriber_name, "Asha Kumar");
}

#[test]
fn deleted_row_is_reported_removed_and_snapshot_total_is_unchanged() {
    let mut rows = january(20);
    let bill = as_bill(
        build_snapshot(&sid(), None, d("2024-01-01"), d("2024-01-31"), &rows, "op").unwrap(),
    );
    let gone = rows.remove(7);

    let r = reconcile(&bill, &rows);
    assert_eq!(r.snapshot_total, Paise(100_000));
    assert_eq!(r.snapshot_meals, 20);
    assert_eq!(r.active_total, Paise(95_000));
    assert_eq!(r.active_meals, 19);
    assert_eq!(r.removed.len(), 1);
    assert_eq!(r.removed[0].date, gone.date);
    assert!(r.repriced.is_empty());
    assert!(!r.is_clean());
}

#[test]
fn repriced_row_is_informational_and_totals_use_snapshot_price() {
    let mut rows = january(3);
    let bill = as_bill(
        build_snapshot(&sid(), None, d("2024-01-01"), d("2024-01-31"), &rows, "op").unwrap(),
    );
    rows[1].price = Paise(6000);

    let r = reconcile(&bill, &rows);
    assert_eq!(r.active_total, Paise(15_000));
    assert_eq!(r.repriced.len(), 1);
    assert_eq!(r.repriced[0].live_price, Paise(6000));
    assert_eq!(r.repriced[0].entry.price, Paise(5000));
}

#[test]
fn other_subscribers_rows_do_not_count_as_present() {
    let rows = january(2);
    let bill = as_bill(
        build_snapshot(&sid(), None, d("2024-01-01"), d("2024-01-31"), &rows, "op").unwrap(),
    );
    let mut impostor = rows[0].clone();
    impostor.subscriber_id = SubscriberId::parse("9111111111").unwrap();

    let r = reconcile(&bill, &[impostor, rows[1].clone()]);
    assert_eq!(r.removed.len(), 1);
    assert_eq!(r.active_meals, 1);
}

#[test]
fn reconcile_is_deterministic() {
    let mut rows = january(10);
    let bill = as_bill(
        build_snapshot(&sid(), None, d("2024-01-01"), d("2024-01-31"), &rows, "op").unwrap(),
    );
    rows.retain(|r| r.date.format("%d").to_string().parse::<u32>().unwrap() % 3 != 0);
    let a = reconcile(&bill, &rows);
    rows.reverse();
    let b = reconcile(&bill, &rows);
    assert_eq!(a, b);
    assert!(a.removed.windows(2).all(|w| w[0] <= w[1]));
}
