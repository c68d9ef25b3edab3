//! The (subscriber, meal type, date) identity is enforced by the database,
//! and a batch that trips it leaves nothing behind.
//!
//! DB-backed tests, skipped if TIFFIN_DATABASE_URL is not set.

use std::sync::Arc;

use chrono::NaiveDate;
use tfn_ledger::AttendanceStore;
use tfn_schemas::{AttendanceFilter, DateRange, MealType, NewAttendance, Paise, SubscriberId, TiffinError};
use tokio::sync::Barrier;
use uuid::Uuid;

async fn store() -> anyhow::Result<Option<tfn_db::PgStore>> {
    let url = match std::env::var(tfn_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TIFFIN_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = tfn_db::connect(&url, 8).await?;
    tfn_db::migrate(&pool).await?;
    Ok(Some(tfn_db::PgStore::new(pool)))
}

fn fresh_subscriber() -> SubscriberId {
    let n = Uuid::new_v4().as_u128() % 1_000_000_000;
    SubscriberId::parse(&format!("9{n:09}")).unwrap()
}

fn row(sid: &SubscriberId, meal: MealType, day: u32) -> NewAttendance {
    NewAttendance {
        subscriber_id: sid.clone(),
        subscriber_name: "Asha Rao".to_string(),
        meal_type: meal,
        date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        price: Paise(5000),
        recorded_by: "9000000000".to_string(),
    }
}

#[tokio::test]
async fn second_insert_of_same_identity_is_a_conflict() -> anyhow::Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let sid = fresh_subscriber();

    store.insert_attendance(row(&sid, MealType::Lunch, 1)).await?;
    let err = store
        .insert_attendance(row(&sid, MealType::Lunch, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, TiffinError::Conflict { .. }), "got {err:?}");

    // Different meal on the same day is a different identity.
    store.insert_attendance(row(&sid, MealType::Dinner, 1)).await?;
    Ok(())
}

#[tokio::test]
async fn batch_with_existing_identity_rolls_back_entirely() -> anyhow::Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let sid = fresh_subscriber();

    store.insert_attendance(row(&sid, MealType::Lunch, 5)).await?;
    let err = store
        .insert_attendance_batch(vec![
            row(&sid, MealType::Breakfast, 5),
            row(&sid, MealType::Lunch, 5),
        ])
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let filter = AttendanceFilter {
        subscriber_id: Some(sid.clone()),
        meal_type: None,
        range: DateRange::unbounded(),
    };
    let rows = store.fetch_attendance(&filter).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].meal_type, MealType::Lunch);

    let existing = store.find_existing_attendance(&[rows[0].key()]).await?;
    assert_eq!(existing.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_inserts_admit_exactly_one() -> anyhow::Result<()> {
    const RACERS: usize = 8;
    let Some(store) = store().await? else {
        return Ok(());
    };
    let sid = fresh_subscriber();
    let start = Arc::new(Barrier::new(RACERS));

    let tasks: Vec<_> = (0..RACERS)
        .map(|_| {
            let store = store.clone();
            let start = Arc::clone(&start);
            let row = row(&sid, MealType::Lunch, 12);
            tokio::spawn(async move {
                start.wait().await;
                store.insert_attendance(row).await
            })
        })
        .collect();

    let mut won = 0;
    let mut conflicts = 0;
    for t in tasks {
        match t.await? {
            Ok(_) => won += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error {e:?}"),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(conflicts, RACERS - 1);

    let rows = store
        .fetch_attendance(&AttendanceFilter {
            subscriber_id: Some(sid.clone()),
            meal_type: None,
            range: DateRange::unbounded(),
        })
        .await?;
    assert_eq!(rows.len(), 1);
    Ok(())
}

#[tokio::test]
async fn update_onto_an_occupied_identity_is_a_conflict() -> anyhow::Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let sid = fresh_subscriber();

    let first = store.insert_attendance(row(&sid, MealType::Lunch, 20)).await?;
    store.insert_attendance(row(&sid, MealType::Lunch, 21)).await?;

    let err = store
        .update_attendance(first.id, row(&sid, MealType::Lunch, 21))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "got {err:?}");
    let unchanged = store.get_attendance(first.id).await?.unwrap();
    assert_eq!(unchanged.date, NaiveDate::from_ymd_opt(2024, 3, 20).unwrap());

    let mut moved = row(&sid, MealType::Dinner, 21);
    moved.price = Paise(6500);
    moved.recorded_by = "someone-else".to_string();
    let updated = store.update_attendance(first.id, moved).await?.unwrap();
    assert_eq!(updated.meal_type, MealType::Dinner);
    assert_eq!(updated.price, Paise(6500));
    assert_eq!(updated.recorded_by, "9000000000");

    assert!(store
        .update_attendance(Uuid::new_v4(), row(&sid, MealType::Breakfast, 22))
        .await?
        .is_none());
    Ok(())
}
