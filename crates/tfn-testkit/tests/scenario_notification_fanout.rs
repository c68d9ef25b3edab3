//! Persist first, push best-effort.

use std::time::{Duration, Instant};

use tfn_schemas::{AttendanceInput, MealType, NewNotification, NotificationKind};
use tfn_testkit::{date, member, owner, phone, Harness};
use tokio::time::timeout;

const RAVI: &str = "9812345678";

fn hello() -> NewNotification {
    NewNotification::new(phone(RAVI), NotificationKind::General, " Menu update ", "Paneer tonight")
}

#[tokio::test]
async fn emit_without_channels_still_persists() {
    let h = Harness::new(date("2024-03-31"));
    let report = h.fanout.notify(&owner(), hello()).await.unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(report.notification.title, "Menu update");
    assert_eq!(report.notification.sent_by.as_deref(), Some("9000000000"));
    assert_eq!(h.store.notifications_for(&phone(RAVI)).len(), 1);
}

#[tokio::test]
async fn every_live_channel_receives_the_push() {
    let h = Harness::new(date("2024-03-31"));
    let reg = h.fanout.registry().clone();
    let (_g1, mut rx1) = reg.register(phone(RAVI));
    let (_g2, mut rx2) = reg.register(phone(RAVI));
    let (_g3, mut other) = reg.register(phone("9000000009"));

    let report = h.fanout.notify(&owner(), hello()).await.unwrap();
    assert_eq!(report.delivered, 2);

    let a = timeout(Duration::from_secs(1), rx1.recv()).await.unwrap().unwrap();
    let b = timeout(Duration::from_secs(1), rx2.recv()).await.unwrap().unwrap();
    assert_eq!(a.id, report.notification.id);
    assert_eq!(b.id, report.notification.id);
    assert!(other.try_recv().is_err());
}

#[tokio::test]
async fn closed_channel_does_not_block_the_rest() {
    let h = Harness::new(date("2024-03-31"));
    let reg = h.fanout.registry().clone();
    let (_dead_guard, dead_rx) = reg.register(phone(RAVI));
    let (_live_guard, mut live_rx) = reg.register(phone(RAVI));
    drop(dead_rx);

    let report = h.fanout.notify(&owner(), hello()).await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert!(live_rx.recv().await.is_some());
    assert_eq!(reg.channel_count(&phone(RAVI)), 1, "closed channel unregistered");
}

#[tokio::test]
async fn full_channel_times_out_without_failing_the_send() {
    let h = Harness::with_push_timeout(date("2024-03-31"), Duration::from_millis(20));
    let reg = h.fanout.registry().clone();
    let (tx, _rx) = tokio::sync::mpsc::channel(1);
    reg.register_sender(phone(RAVI), tx);

    h.fanout.notify(&owner(), hello()).await.unwrap();
    let second = h.fanout.notify(&owner(), hello()).await.unwrap();
    assert_eq!(second.delivered, 0);
    assert_eq!(second.failed, 1);
    assert_eq!(h.store.notifications_for(&phone(RAVI)).len(), 2);
}

#[tokio::test]
async fn mark_read_is_idempotent_and_scoped() {
    let h = Harness::new(date("2024-03-31"));
    let report = h.fanout.notify(&owner(), hello()).await.unwrap();
    let id = report.notification.id;
    let ravi = member(RAVI, "Ravi");

    assert_eq!(h.fanout.unread_count(&ravi, &phone(RAVI)).await.unwrap(), 1);
    let first = h.fanout.mark_read(&ravi, id).await.unwrap();
    let again = h.fanout.mark_read(&ravi, id).await.unwrap();
    assert!(first.read && again.read);
    assert_eq!(h.fanout.unread_count(&ravi, &phone(RAVI)).await.unwrap(), 0);

    let snoop = member("9000000009", "Snoop");
    assert!(h.fanout.mark_read(&snoop, id).await.is_err());
    assert!(h.fanout.list(&snoop, &phone(RAVI), None).await.is_err());
}

#[tokio::test]
async fn batch_validates_everything_before_writing() {
    let h = Harness::new(date("2024-03-31"));
    let bad = NewNotification::new(phone(RAVI), NotificationKind::General, "", "body");
    let err = h
        .fanout
        .notify_batch(&owner(), vec![hello(), bad])
        .await
        .unwrap_err();
    let tfn_schemas::TiffinError::Validation { errors, .. } = err else {
        panic!("expected validation");
    };
    assert_eq!(errors[0].field, "notifications[1].title");
    assert!(h.store.notifications_for(&phone(RAVI)).is_empty());
}

#[tokio::test]
async fn notification_failure_never_fails_the_business_write() {
    let h = Harness::new(date("2024-03-31"));
    h.store.fail_notifications(true);

    let rec = h
        .ledger
        .record(
            &owner(),
            AttendanceInput {
                subscriber_id: RAVI.to_string(),
                subscriber_name: "Ravi Kumar".to_string(),
                meal_type: MealType::Breakfast,
                date: date("2024-03-30"),
                price_paise: 3000,
            },
        )
        .await
        .unwrap();
    assert_eq!(rec.meal_type, MealType::Breakfast);
    assert_eq!(h.store.attendance_count(), 1);
    assert!(h.store.notifications_for(&phone(RAVI)).is_empty());
}

fn lunches(phone_number: &str, days: u32) -> Vec<AttendanceInput> {
    (1..=days)
        .map(|day| AttendanceInput {
            subscriber_id: phone_number.to_string(),
            subscriber_name: "Ravi Kumar".to_string(),
            meal_type: MealType::Lunch,
            date: date(&format!("2024-03-{day:02}")),
            price_paise: 5000,
        })
        .collect()
}

#[tokio::test]
async fn stalled_channel_does_not_hold_up_business_writes() {
    let push_timeout = Duration::from_millis(200);
    let h = Harness::with_push_timeout(date("2024-03-31"), push_timeout);
    // Never read: after one frame every push to it waits out the timeout.
    let (tx, _stalled) = tokio::sync::mpsc::channel(1);
    h.fanout.registry().register_sender(phone(RAVI), tx);

    let started = Instant::now();
    let recs = h.ledger.record_batch(&owner(), lunches(RAVI, 10)).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(recs.len(), 10);
    assert!(
        elapsed < push_timeout,
        "record_batch waited on delivery: {elapsed:?}"
    );
    assert_eq!(h.store.notifications_for(&phone(RAVI)).len(), 10);
}

#[tokio::test]
async fn operator_batch_to_a_stalled_channel_costs_one_timeout() {
    let push_timeout = Duration::from_millis(100);
    let h = Harness::with_push_timeout(date("2024-03-31"), push_timeout);
    let (tx, _stalled) = tokio::sync::mpsc::channel(1);
    h.fanout.registry().register_sender(phone(RAVI), tx);
    let first = h.fanout.notify(&owner(), hello()).await.unwrap();
    assert_eq!(first.delivered, 1);

    let started = Instant::now();
    let reports = h
        .fanout
        .notify_batch(&owner(), (0..5).map(|_| hello()).collect())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(reports.len(), 5);
    assert!(reports.iter().all(|r| r.delivered == 0 && r.failed == 1));
    assert!(
        elapsed < push_timeout * 3,
        "batch pushes were serialised: {elapsed:?}"
    );
    assert_eq!(h.store.notifications_for(&phone(RAVI)).len(), 6);
}

#[tokio::test]
async fn business_events_still_reach_live_channels() {
    let h = Harness::new(date("2024-03-31"));
    let (_guard, mut rx) = h.fanout.registry().register(phone(RAVI));

    let rec = h
        .ledger
        .record(&owner(), lunches(RAVI, 1).remove(0))
        .await
        .unwrap();

    let pushed = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pushed.title, "Attendance Recorded");
    assert_eq!(
        pushed.related,
        Some(tfn_schemas::RelatedEntity::Attendance(rec.id))
    );
}
