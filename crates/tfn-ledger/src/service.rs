use std::sync::Arc;

use chrono::NaiveDate;
use tfn_schemas::{
    AttendanceFilter, AttendanceInput, AttendanceKey, AttendanceRecord, Clock, DateRange,
    Identity, MealType, NewAttendance, NewNotification, NotificationKind, NotificationSink, Page,
    PageRequest, RelatedEntity, Result, SubscriberId, TiffinError,
};
use tracing::info;
use uuid::Uuid;

use crate::store::AttendanceStore;
use crate::summary::{self, DailySummary, GroupBy, RangeSummary, SubscriberHistory};
use crate::validate::{in_batch_duplicates, validate_batch, validate_input};
use crate::{ALREADY_RECORDED, DUPLICATE_BATCH};

#[derive(Clone)]
pub struct AttendanceLedger {
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
}

impl AttendanceLedger {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { store, clock, sink }
    }

    // -----------------------------------------------------------------------
    // Writes (owner only)
    // -----------------------------------------------------------------------

    pub async fn record(&self, actor: &Identity, input: AttendanceInput) -> Result<AttendanceRecord> {
        actor.require_owner()?;
        let row = validate_input(&input, self.clock.today(), &actor.actor())?;

        let record = self.store.insert_attendance(row).await.map_err(|e| match e {
            TiffinError::Conflict { duplicates, .. } => TiffinError::Conflict {
                message: ALREADY_RECORDED.to_string(),
                duplicates,
            },
            other => other,
        })?;

        info!(
            id = %record.id,
            subscriber = %record.subscriber_id,
            meal = %record.meal_type,
            date = %record.date,
            "attendance/recorded"
        );
        self.sink.emit(recorded_notice(&record, actor)).await;
        Ok(record)
    }

    /// All-or-nothing. Every offending entry is listed in the Conflict.
    pub async fn record_batch(
        &self,
        actor: &Identity,
        inputs: Vec<AttendanceInput>,
    ) -> Result<Vec<AttendanceRecord>> {
        actor.require_owner()?;
        let rows = validate_batch(&inputs, self.clock.today(), &actor.actor())?;

        let mut duplicates = in_batch_duplicates(&rows);
        let keys: Vec<AttendanceKey> = rows.iter().map(NewAttendance::key).collect();
        let existing = self.store.find_existing_attendance(&keys).await?;
        duplicates.extend(existing.iter().map(AttendanceRecord::label));
        if !duplicates.is_empty() {
            return Err(TiffinError::Conflict {
                message: DUPLICATE_BATCH.to_string(),
                duplicates,
            });
        }

        // The pre-check above is advisory; a concurrent writer can still win
        // the race, in which case the store rolls back and reports Conflict.
        let records = match self.store.insert_attendance_batch(rows).await {
            Ok(records) => records,
            Err(TiffinError::Conflict { duplicates, .. }) => {
                let raced = self.store.find_existing_attendance(&keys).await?;
                let mut labels: Vec<String> = raced.iter().map(AttendanceRecord::label).collect();
                if labels.is_empty() {
                    labels = duplicates;
                }
                return Err(TiffinError::Conflict {
                    message: DUPLICATE_BATCH.to_string(),
                    duplicates: labels,
                });
            }
            Err(e) => return Err(e),
        };

        info!(count = records.len(), "attendance/batch_recorded");
        for record in &records {
            self.sink.emit(recorded_notice(record, actor)).await;
        }
        Ok(records)
    }

    /// Replace a record's fields. Moving it onto a key another record
    /// already holds is a Conflict enforced by the store. Bills that
    /// snapshotted the old values keep them.
    pub async fn update(
        &self,
        actor: &Identity,
        id: Uuid,
        input: AttendanceInput,
    ) -> Result<AttendanceRecord> {
        actor.require_owner()?;
        let row = validate_input(&input, self.clock.today(), &actor.actor())?;

        let updated = self
            .store
            .update_attendance(id, row)
            .await
            .map_err(|e| match e {
                TiffinError::Conflict { duplicates, .. } => TiffinError::Conflict {
                    message: ALREADY_RECORDED.to_string(),
                    duplicates,
                },
                other => other,
            })?
            .ok_or_else(|| TiffinError::not_found(format!("attendance record {id} not found")))?;

        info!(
            id = %updated.id,
            subscriber = %updated.subscriber_id,
            meal = %updated.meal_type,
            date = %updated.date,
            by = %actor.actor(),
            "attendance/updated"
        );
        let notice = NewNotification::new(
            updated.subscriber_id.clone(),
            NotificationKind::Attendance,
            "Attendance Updated",
            format!(
                "Your {} on {} now reads {}",
                updated.meal_type, updated.date, updated.price
            ),
        )
        .related(RelatedEntity::Attendance(updated.id))
        .sent_by(actor.actor());
        self.sink.emit(notice).await;
        Ok(updated)
    }

    /// Hard delete. Bills that already snapshotted the row are untouched.
    pub async fn delete(&self, actor: &Identity, id: Uuid) -> Result<AttendanceRecord> {
        actor.require_owner()?;
        let removed = self
            .store
            .delete_attendance(id)
            .await?
            .ok_or_else(|| TiffinError::not_found(format!("attendance record {id} not found")))?;

        info!(
            id = %removed.id,
            subscriber = %removed.subscriber_id,
            by = %actor.actor(),
            "attendance/deleted"
        );
        let notice = NewNotification::new(
            removed.subscriber_id.clone(),
            NotificationKind::Attendance,
            "Attendance Removed",
            format!(
                "Your {} on {} was removed from the register",
                removed.meal_type, removed.date
            ),
        )
        .related(RelatedEntity::Attendance(removed.id))
        .sent_by(actor.actor());
        self.sink.emit(notice).await;
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get(&self, id: Uuid) -> Result<AttendanceRecord> {
        self.store
            .get_attendance(id)
            .await?
            .ok_or_else(|| TiffinError::not_found(format!("attendance record {id} not found")))
    }

    pub async fn query(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>> {
        check_range(&filter.range)?;
        self.store.query_attendance(filter, page).await
    }

    pub async fn daily_summary(
        &self,
        date: NaiveDate,
        meal_type: Option<MealType>,
    ) -> Result<DailySummary> {
        let filter = AttendanceFilter {
            subscriber_id: None,
            meal_type,
            range: DateRange::between(date, date),
        };
        let rows = self.store.fetch_attendance(&filter).await?;
        Ok(summary::daily(date, meal_type, &rows))
    }

    pub async fn range_summary(
        &self,
        range: DateRange,
        meal_type: Option<MealType>,
        group_by: GroupBy,
    ) -> Result<RangeSummary> {
        check_range(&range)?;
        let filter = AttendanceFilter {
            subscriber_id: None,
            meal_type,
            range,
        };
        let rows = self.store.fetch_attendance(&filter).await?;
        Ok(summary::range(range, meal_type, group_by, &rows))
    }

    /// One page of the subscriber's records plus counters over their whole history.
    pub async fn subscriber_history(
        &self,
        subscriber_id: &SubscriberId,
        range: DateRange,
        page: PageRequest,
    ) -> Result<SubscriberHistory> {
        check_range(&range)?;
        let paged = self
            .store
            .query_attendance(
                &AttendanceFilter {
                    subscriber_id: Some(subscriber_id.clone()),
                    meal_type: None,
                    range,
                },
                page,
            )
            .await?;
        let all = self
            .store
            .fetch_attendance(&AttendanceFilter {
                subscriber_id: Some(subscriber_id.clone()),
                ..AttendanceFilter::default()
            })
            .await?;
        Ok(SubscriberHistory {
            subscriber_id: subscriber_id.clone(),
            records: paged,
            lifetime: summary::lifetime(&all),
        })
    }
}

fn check_range(range: &DateRange) -> Result<()> {
    if range.is_inverted() {
        return Err(TiffinError::validation(
            "range",
            "Start date must not be after end date",
        ));
    }
    Ok(())
}

fn recorded_notice(record: &AttendanceRecord, actor: &Identity) -> NewNotification {
    NewNotification::new(
        record.subscriber_id.clone(),
        NotificationKind::Attendance,
        "Attendance Recorded",
        format!(
            "Your {} on {} has been recorded ({})",
            record.meal_type, record.date, record.price
        ),
    )
    .related(RelatedEntity::Attendance(record.id))
    .sent_by(actor.actor())
}
