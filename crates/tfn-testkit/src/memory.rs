//! [`MemoryStore`]: every store trait over one mutex.
//!
//! Each trait method takes the lock once, so the atomicity the Postgres
//! store gets from constraints and transactions holds here too. Sort orders
//! compare meal types by their stored text to match the SQL ordering.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tfn_billing::{BillNumbering, BillStatusChange, BillStore};
use tfn_ledger::AttendanceStore;
use tfn_notify::NotificationStore;
use tfn_schemas::{
    AttendanceFilter, AttendanceKey, AttendanceRecord, Bill, BillFilter, BillStatus,
    NewAttendance, NewBill, NewNotification, NewSubscription, Notification, Page, PageRequest,
    Result, SubscriberId, Subscription, SubscriptionFilter, SubscriptionStatus, SubscriptionTerms,
    TiffinError,
};
use tfn_subscription::SubscriptionStore;
use uuid::Uuid;

#[derive(Default)]
struct State {
    attendance: HashMap<Uuid, AttendanceRecord>,
    identity: HashMap<AttendanceKey, Uuid>,
    bill_counter: u64,
    bills: Vec<Bill>,
    subscriptions: Vec<Subscription>,
    notifications: Vec<Notification>,
}

impl State {
    fn insert_attendance(&mut self, row: NewAttendance) -> Result<AttendanceRecord> {
        let key = row.key();
        if self.identity.contains_key(&key) {
            return Err(TiffinError::Conflict {
                message: "attendance identity already exists".to_string(),
                duplicates: vec![row.label()],
            });
        }
        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            subscriber_id: row.subscriber_id,
            subscriber_name: row.subscriber_name,
            meal_type: row.meal_type,
            date: row.date,
            price: row.price,
            recorded_by: row.recorded_by,
            created_at: Utc::now(),
        };
        self.identity.insert(key, record.id);
        self.attendance.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_attendance(&mut self, id: Uuid, row: NewAttendance) -> Result<Option<AttendanceRecord>> {
        let Some(old_key) = self.attendance.get(&id).map(AttendanceRecord::key) else {
            return Ok(None);
        };
        let key = row.key();
        if self.identity.get(&key).is_some_and(|owner| *owner != id) {
            return Err(TiffinError::Conflict {
                message: "attendance identity already exists".to_string(),
                duplicates: vec![row.label()],
            });
        }
        self.identity.remove(&old_key);
        self.identity.insert(key, id);

        let Some(record) = self.attendance.get_mut(&id) else {
            return Ok(None);
        };
        record.subscriber_id = row.subscriber_id;
        record.subscriber_name = row.subscriber_name;
        record.meal_type = row.meal_type;
        record.date = row.date;
        record.price = row.price;
        Ok(Some(record.clone()))
    }

    fn remove_attendance(&mut self, id: Uuid) -> Option<AttendanceRecord> {
        let removed = self.attendance.remove(&id)?;
        self.identity.remove(&removed.key());
        Some(removed)
    }

    fn matching_attendance(&self, filter: &AttendanceFilter) -> Vec<AttendanceRecord> {
        self.attendance
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    fn matching_subscriptions(&self, filter: &SubscriptionFilter) -> Vec<Subscription> {
        let mut out: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        out
    }
}

fn meal_text_order(a: &AttendanceRecord, b: &AttendanceRecord) -> Ordering {
    a.meal_type.as_str().cmp(b.meal_type.as_str())
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_notifications: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Make every notification insert fail until switched back off.
    pub fn fail_notifications(&self, on: bool) {
        self.fail_notifications.store(on, AtomicOrdering::SeqCst);
    }

    pub fn attendance_count(&self) -> usize {
        self.lock().attendance.len()
    }

    pub fn bill_count(&self) -> usize {
        self.lock().bills.len()
    }

    pub fn notifications_for(&self, subscriber: &SubscriberId) -> Vec<Notification> {
        self.lock()
            .notifications
            .iter()
            .filter(|n| &n.subscriber_id == subscriber)
            .cloned()
            .collect()
    }

    /// Direct write used to stage rows the service layer would refuse.
    pub fn set_subscription_status(&self, id: Uuid, status: SubscriptionStatus) {
        if let Some(s) = self.lock().subscriptions.iter_mut().find(|s| s.id == id) {
            s.status = status;
        }
    }
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert_attendance(&self, row: NewAttendance) -> Result<AttendanceRecord> {
        self.lock().insert_attendance(row)
    }

    async fn insert_attendance_batch(&self, rows: Vec<NewAttendance>) -> Result<Vec<AttendanceRecord>> {
        let mut state = self.lock();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match state.insert_attendance(row) {
                Ok(r) => out.push(r),
                Err(e) => {
                    for r in &out {
                        state.remove_attendance(r.id);
                    }
                    return Err(e);
                }
            }
        }
        Ok(out)
    }

    async fn find_existing_attendance(&self, keys: &[AttendanceKey]) -> Result<Vec<AttendanceRecord>> {
        let state = self.lock();
        let mut out: Vec<AttendanceRecord> = Vec::new();
        for key in keys {
            if let Some(r) = state.identity.get(key).and_then(|id| state.attendance.get(id)) {
                if !out.iter().any(|o| o.id == r.id) {
                    out.push(r.clone());
                }
            }
        }
        out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| meal_text_order(a, b)));
        Ok(out)
    }

    async fn get_attendance(&self, id: Uuid) -> Result<Option<AttendanceRecord>> {
        Ok(self.lock().attendance.get(&id).cloned())
    }

    async fn query_attendance(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>> {
        let mut rows = self.lock().matching_attendance(filter);
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| meal_text_order(a, b))
                .then(a.id.cmp(&b.id))
        });
        Ok(Page::from_sorted(rows, page))
    }

    async fn fetch_attendance(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>> {
        let mut rows = self.lock().matching_attendance(filter);
        rows.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| meal_text_order(a, b))
                .then(a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn update_attendance(&self, id: Uuid, row: NewAttendance) -> Result<Option<AttendanceRecord>> {
        self.lock().update_attendance(id, row)
    }

    async fn delete_attendance(&self, id: Uuid) -> Result<Option<AttendanceRecord>> {
        Ok(self.lock().remove_attendance(id))
    }
}

// ---------------------------------------------------------------------------
// Bills
// ---------------------------------------------------------------------------

#[async_trait]
impl BillStore for MemoryStore {
    async fn insert_bill(&self, bill: NewBill, numbering: &BillNumbering) -> Result<Bill> {
        let mut state = self.lock();
        let seq = state.bill_counter + 1;
        let now = Utc::now();
        let stored = Bill {
            id: Uuid::new_v4(),
            bill_number: numbering.format(seq),
            subscriber_id: bill.subscriber_id,
            subscriber_name: bill.subscriber_name,
            start_date: bill.start_date,
            end_date: bill.end_date,
            total_meals: bill.total_meals,
            total: bill.total,
            entries: bill.entries,
            status: BillStatus::Generated,
            generated_by: bill.generated_by,
            created_at: now,
            updated_at: now,
        };
        state.bill_counter = seq;
        state.bills.push(stored.clone());
        Ok(stored)
    }

    async fn get_bill(&self, id: Uuid) -> Result<Option<Bill>> {
        Ok(self.lock().bills.iter().find(|b| b.id == id).cloned())
    }

    async fn list_bills(&self, filter: &BillFilter) -> Result<Vec<Bill>> {
        Ok(self
            .lock()
            .bills
            .iter()
            .rev()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn update_bill_status(
        &self,
        id: Uuid,
        status: BillStatus,
    ) -> Result<Option<BillStatusChange>> {
        let mut state = self.lock();
        let Some(bill) = state.bills.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        let previous = bill.status;
        bill.status = status;
        bill.updated_at = Utc::now();
        Ok(Some(BillStatusChange {
            previous,
            bill: bill.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn insert_subscription(&self, row: NewSubscription) -> Result<Subscription> {
        let now = Utc::now();
        let sub = Subscription {
            id: Uuid::new_v4(),
            subscriber_id: row.subscriber_id,
            subscriber_name: row.subscriber_name,
            plan: row.plan,
            start_date: row.start_date,
            end_date: row.end_date,
            price: row.price,
            meals_included: row.meals_included,
            status: SubscriptionStatus::Active,
            created_by: row.created_by,
            created_at: now,
            updated_at: now,
        };
        self.lock().subscriptions.push(sub.clone());
        Ok(sub)
    }

    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        Ok(self.lock().subscriptions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_subscriptions(
        &self,
        filter: &SubscriptionFilter,
        page: PageRequest,
    ) -> Result<Page<Subscription>> {
        Ok(Page::from_sorted(self.lock().matching_subscriptions(filter), page))
    }

    async fn all_subscriptions(&self, filter: &SubscriptionFilter) -> Result<Vec<Subscription>> {
        Ok(self.lock().matching_subscriptions(filter))
    }

    async fn list_expirable(&self, today: NaiveDate) -> Result<Vec<Subscription>> {
        let mut out: Vec<Subscription> = self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| {
                matches!(s.status, SubscriptionStatus::Active | SubscriptionStatus::Paused)
                    && s.end_date < today
            })
            .cloned()
            .collect();
        out.sort_by_key(|s| s.end_date);
        Ok(out)
    }

    async fn list_expiring(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Subscription>> {
        let mut out: Vec<Subscription> = self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| {
                s.status == SubscriptionStatus::Active && s.end_date >= from && s.end_date <= to
            })
            .cloned()
            .collect();
        out.sort_by_key(|s| s.end_date);
        Ok(out)
    }

    async fn transition_subscription(
        &self,
        id: Uuid,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> Result<Option<Subscription>> {
        let mut state = self.lock();
        let Some(sub) = state.subscriptions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if !from.contains(&sub.status) {
            return Ok(None);
        }
        sub.status = to;
        sub.updated_at = Utc::now();
        Ok(Some(sub.clone()))
    }

    async fn update_subscription_terms(
        &self,
        id: Uuid,
        from: &[SubscriptionStatus],
        terms: SubscriptionTerms,
    ) -> Result<Option<Subscription>> {
        let mut state = self.lock();
        let Some(sub) = state.subscriptions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if !from.contains(&sub.status) {
            return Ok(None);
        }
        sub.subscriber_name = terms.subscriber_name;
        sub.plan = terms.plan;
        sub.start_date = terms.start_date;
        sub.end_date = terms.end_date;
        sub.price = terms.price;
        sub.meals_included = terms.meals_included;
        sub.updated_at = Utc::now();
        Ok(Some(sub.clone()))
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, n: NewNotification) -> Result<Notification> {
        if self.fail_notifications.load(AtomicOrdering::SeqCst) {
            return Err(TiffinError::Internal(anyhow!("notification store unavailable")));
        }
        let stored = Notification {
            id: Uuid::new_v4(),
            subscriber_id: n.subscriber_id,
            title: n.title,
            message: n.message,
            kind: n.kind,
            read: false,
            related: n.related,
            sent_by: n.sent_by,
            created_at: Utc::now(),
        };
        self.lock().notifications.push(stored.clone());
        Ok(stored)
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.lock().notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn list_notifications(
        &self,
        subscriber: &SubscriberId,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| &n.subscriber_id == subscriber)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, subscriber: &SubscriberId) -> Result<u64> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .filter(|n| &n.subscriber_id == subscriber && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, id: Uuid) -> Result<Option<Notification>> {
        let mut state = self.lock();
        let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };
        n.read = true;
        Ok(Some(n.clone()))
    }

    async fn mark_all_read(&self, subscriber: &SubscriberId) -> Result<u64> {
        let mut changed = 0;
        for n in self
            .lock()
            .notifications
            .iter_mut()
            .filter(|n| &n.subscriber_id == subscriber && !n.read)
        {
            n.read = true;
            changed += 1;
        }
        Ok(changed)
    }
}
