use chrono::{NaiveDate, TimeZone, Utc};
use tfn_ledger::summary::{daily, lifetime, range, TOP_SUBSCRIBERS};
use tfn_ledger::GroupBy;
use tfn_schemas::{AttendanceRecord, DateRange, MealType, Paise, SubscriberId};
use uuid::Uuid;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn rec(phone: &str, name: &str, meal: MealType, date: &str, price: i64) -> AttendanceRecord {
    AttendanceRecord {
        id: Uuid::new_v4(),
        subscriber_id: SubscriberId::parse(phone).unwrap(),
        subscriber_name: name.to_string(),
        meal_type: meal,
        date: d(date),
        price: Paise(price),
        recorded_by: "9000000001".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

#[test]
fn daily_summary_breaks_down_by_meal() {
    let rows = vec![
        rec("9000000002", "Asha", MealType::Breakfast, "2024-01-05", 3000),
        rec("9000000003", "Ravi", MealType::Lunch, "2024-01-05", 5000),
        rec("9000000004", "Meena", MealType::Lunch, "2024-01-05", 5000),
    ];
    let s = daily(d("2024-01-05"), None, &rows);
    assert_eq!(s.total_meals, 3);
    assert_eq!(s.total, Paise(13000));
    assert_eq!(s.average, Paise(4333), "integer mean truncates");
    assert_eq!(s.by_meal.len(), 2, "dinner absent => omitted");
    assert_eq!(s.by_meal[0].meal_type, MealType::Breakfast);
    assert_eq!(s.by_meal[1].count, 2);
    assert_eq!(s.by_meal[1].total, Paise(10000));
}

#[test]
fn empty_day_is_all_zero() {
    let s = daily(d("2024-01-05"), Some(MealType::Dinner), &[]);
    assert_eq!(s.total_meals, 0);
    assert_eq!(s.total, Paise::ZERO);
    assert_eq!(s.average, Paise::ZERO);
    assert!(s.by_meal.is_empty());
}

#[test]
fn range_by_subscriber_orders_by_count_then_id_and_caps() {
    let mut rows = Vec::new();
    for i in 0..12u32 {
        let phone = format!("90000000{:02}", i + 10);
        // subscriber i gets (i % 3) + 1 meals
        for day in 0..=(i % 3) {
            rows.push(rec(
                &phone,
                "Name",
                MealType::Lunch,
                &format!("2024-01-{:02}", day + 1),
                5000,
            ));
        }
    }
    let s = range(DateRange::unbounded(), None, GroupBy::Subscriber, &rows);
    assert_eq!(s.unique_subscribers, 12);
    assert_eq!(s.groups.len(), TOP_SUBSCRIBERS);
    assert!(s.groups.windows(2).all(|w| {
        w[0].count > w[1].count || (w[0].count == w[1].count && w[0].key < w[1].key)
    }));
    assert_eq!(s.groups[0].count, 3);
    assert_eq!(s.groups[0].key, "9000000012");
}

#[test]
fn range_by_subscriber_reports_latest_name() {
    let rows = vec![
        rec("9000000002", "Asha K", MealType::Lunch, "2024-01-01", 5000),
        rec("9000000002", "Asha Kumar", MealType::Lunch, "2024-01-02", 5000),
    ];
    let s = range(DateRange::unbounded(), None, GroupBy::Subscriber, &rows);
    assert_eq!(s.groups[0].name.as_deref(), Some("Asha Kumar"));
}

#[test]
fn range_by_meal_type_is_not_capped() {
    let rows = vec![
        rec("9000000002", "Asha", MealType::Breakfast, "2024-01-01", 3000),
        rec("9000000002", "Asha", MealType::Dinner, "2024-01-01", 6000),
        rec("9000000003", "Ravi", MealType::Dinner, "2024-01-01", 6000),
    ];
    let s = range(
        DateRange::between(d("2024-01-01"), d("2024-01-31")),
        None,
        GroupBy::MealType,
        &rows,
    );
    let keys: Vec<_> = s.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["dinner", "breakfast"]);
    assert!(s.groups.iter().all(|g| g.name.is_none()));
    assert_eq!(s.total, Paise(15000));
}

#[test]
fn lifetime_counts_each_meal_and_bounds_dates() {
    let rows = vec![
        rec("9000000002", "Asha", MealType::Breakfast, "2024-01-03", 3000),
        rec("9000000002", "Asha", MealType::Lunch, "2024-01-01", 5000),
        rec("9000000002", "Asha", MealType::Lunch, "2024-02-10", 5000),
    ];
    let c = lifetime(&rows);
    assert_eq!(c.visits, 3);
    assert_eq!(c.spend, Paise(13000));
    assert_eq!((c.breakfast, c.lunch, c.dinner), (1, 2, 0));
    assert_eq!(c.first_visit, Some(d("2024-01-01")));
    assert_eq!(c.last_visit, Some(d("2024-02-10")));
}
