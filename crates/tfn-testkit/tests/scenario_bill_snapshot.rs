//! Bills are immutable value snapshots; the ledger may drift underneath
//! and reconciliation reports it without touching the bill.

use tfn_billing::GenerateBill;
use tfn_ledger::AttendanceStore;
use tfn_schemas::{AttendanceInput, BillStatus, MealType, NewAttendance, Paise, TiffinError};
use tfn_testkit::{date, member, owner, phone, Harness};

const ASHA: &str = "9876543210";

async fn twenty_lunches(h: &Harness) -> Vec<tfn_schemas::AttendanceRecord> {
    let inputs = (1..=20)
        .map(|day| AttendanceInput {
            subscriber_id: ASHA.to_string(),
            subscriber_name: "Asha Rao".to_string(),
            meal_type: MealType::Lunch,
            date: date(&format!("2024-03-{day:02}")),
            price_paise: 5000,
        })
        .collect();
    h.ledger.record_batch(&owner(), inputs).await.unwrap()
}

fn march(subscriber: &str) -> GenerateBill {
    GenerateBill {
        subscriber_id: subscriber.to_string(),
        start_date: date("2024-03-01"),
        end_date: date("2024-03-31"),
        subscriber_name: None,
    }
}

#[tokio::test]
async fn first_bill_snapshots_the_window() {
    let h = Harness::new(date("2024-03-31"));
    twenty_lunches(&h).await;

    let bill = h.billing.generate(&owner(), march(ASHA)).await.unwrap();
    assert_eq!(bill.bill_number, "BILL000001");
    assert_eq!(bill.total_meals, 20);
    assert_eq!(bill.total, Paise(100_000));
    assert_eq!(bill.entries.len(), 20);
    assert_eq!(bill.status, BillStatus::Generated);
    assert_eq!(bill.subscriber_name, "Asha Rao");

    let inbox = h.store.notifications_for(&phone(ASHA));
    let note = inbox.iter().find(|n| n.title == "Bill Generated").unwrap();
    assert_eq!(
        note.message,
        "Your bill for 2024-03-01 to 2024-03-31 has been generated. Total: ₹1000"
    );

    let second = h.billing.generate(&owner(), march(ASHA)).await.unwrap();
    assert_eq!(second.bill_number, "BILL000002");
}

#[tokio::test]
async fn empty_window_creates_nothing_and_burns_no_number() {
    let h = Harness::new(date("2024-03-31"));

    let err = h.billing.generate(&owner(), march(ASHA)).await.unwrap_err();
    assert!(matches!(err, TiffinError::NotFound(_)), "got {err:?}");
    assert_eq!(h.store.bill_count(), 0);

    twenty_lunches(&h).await;
    let bill = h.billing.generate(&owner(), march(ASHA)).await.unwrap();
    assert_eq!(bill.bill_number, "BILL000001");
}

#[tokio::test]
async fn inverted_window_is_a_validation_error() {
    let h = Harness::new(date("2024-03-31"));
    let mut req = march(ASHA);
    req.start_date = date("2024-04-01");
    let err = h.billing.generate(&owner(), req).await.unwrap_err();
    assert!(matches!(err, TiffinError::Validation { .. }));
}

#[tokio::test]
async fn total_that_overflows_is_rejected_and_nothing_is_persisted() {
    let h = Harness::new(date("2024-03-31"));
    // Written straight to the store: the ledger would refuse these prices.
    for day in ["2024-03-01", "2024-03-02"] {
        h.store
            .insert_attendance(NewAttendance {
                subscriber_id: phone(ASHA),
                subscriber_name: "Asha Rao".to_string(),
                meal_type: MealType::Lunch,
                date: date(day),
                price: Paise(i64::MAX / 2 + 1),
                recorded_by: "import".to_string(),
            })
            .await
            .unwrap();
    }

    let err = h.billing.generate(&owner(), march(ASHA)).await.unwrap_err();
    let TiffinError::Validation { errors, .. } = err else {
        panic!("expected validation, got {err:?}");
    };
    assert_eq!(errors[0].field, "total");
    assert_eq!(h.store.bill_count(), 0);
}

#[tokio::test]
async fn supplied_name_is_validated_and_blank_falls_back_to_ledger() {
    let h = Harness::new(date("2024-03-31"));
    twenty_lunches(&h).await;

    let mut req = march(ASHA);
    req.subscriber_name = Some(" A ".to_string());
    let err = h.billing.generate(&owner(), req).await.unwrap_err();
    let TiffinError::Validation { errors, .. } = err else {
        panic!("expected validation, got {err:?}");
    };
    assert_eq!(errors[0].field, "subscriber_name");
    assert_eq!(h.store.bill_count(), 0);

    let mut req = march(ASHA);
    req.subscriber_name = Some("   ".to_string());
    let bill = h.billing.generate(&owner(), req).await.unwrap();
    assert_eq!(bill.subscriber_name, "Asha Rao");

    let mut req = march(ASHA);
    req.subscriber_name = Some("  Asha R.  ".to_string());
    let bill = h.billing.generate(&owner(), req).await.unwrap();
    assert_eq!(bill.subscriber_name, "Asha R.");
}

#[tokio::test]
async fn deleting_a_billed_record_shows_up_in_reconciliation_only() {
    let h = Harness::new(date("2024-03-31"));
    let recs = twenty_lunches(&h).await;
    let bill = h.billing.generate(&owner(), march(ASHA)).await.unwrap();

    h.ledger.delete(&owner(), recs[4].id).await.unwrap();

    let view = h.billing.reconciled(&owner(), bill.id).await.unwrap();
    assert_eq!(view.bill, bill, "stored bill never changes");
    let r = view.reconciliation;
    assert_eq!(r.snapshot_total, Paise(100_000));
    assert_eq!(r.snapshot_meals, 20);
    assert_eq!(r.active_total, Paise(95_000));
    assert_eq!(r.active_meals, 19);
    assert_eq!(r.removed.len(), 1);
    assert_eq!(r.removed[0].date, date("2024-03-05"));
    assert!(!r.is_clean());
}

#[tokio::test]
async fn members_only_see_their_own_bills() {
    let h = Harness::new(date("2024-03-31"));
    twenty_lunches(&h).await;
    let bill = h.billing.generate(&owner(), march(ASHA)).await.unwrap();

    let stranger = member("9111111111", "Ravi");
    let err = h.billing.get(&stranger, bill.id).await.unwrap_err();
    assert!(matches!(err, TiffinError::Forbidden(_)));
    assert!(h
        .billing
        .list(&stranger, Default::default())
        .await
        .unwrap()
        .is_empty());

    let asha = member(ASHA, "Asha");
    assert_eq!(h.billing.list(&asha, Default::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn status_update_notifies_only_on_change() {
    let h = Harness::new(date("2024-03-31"));
    twenty_lunches(&h).await;
    let bill = h.billing.generate(&owner(), march(ASHA)).await.unwrap();
    let before = h.store.notifications_for(&phone(ASHA)).len();

    let paid = h
        .billing
        .update_status(&owner(), bill.id, BillStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.status, BillStatus::Paid);
    h.billing
        .update_status(&owner(), bill.id, BillStatus::Paid)
        .await
        .unwrap();

    let after = h.store.notifications_for(&phone(ASHA));
    assert_eq!(after.len(), before + 1);
    assert_eq!(after.last().unwrap().message, "Bill BILL000001 marked paid");
}
