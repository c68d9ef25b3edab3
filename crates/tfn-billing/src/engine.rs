use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tfn_ledger::AttendanceStore;
use tfn_schemas::{
    check_name, AttendanceFilter, Bill, BillFilter, BillStatus, DateRange, Identity,
    NewNotification, NotificationKind, NotificationSink, RelatedEntity, Result, SubscriberId,
    TiffinError, Validator,
};
use tracing::info;
use uuid::Uuid;

use crate::reconcile::{reconcile, BillReconciliation};
use crate::snapshot::build_snapshot;
use crate::store::BillStore;
use crate::BillNumbering;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateBill {
    pub subscriber_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Defaults to the latest name on the matched ledger rows.
    #[serde(default)]
    pub subscriber_name: Option<String>,
}

/// A bill together with its read-time reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillView {
    pub bill: Bill,
    pub reconciliation: BillReconciliation,
}

#[derive(Clone)]
pub struct BillingEngine {
    bills: Arc<dyn BillStore>,
    ledger: Arc<dyn AttendanceStore>,
    sink: Arc<dyn NotificationSink>,
    numbering: BillNumbering,
}

impl BillingEngine {
    pub fn new(
        bills: Arc<dyn BillStore>,
        ledger: Arc<dyn AttendanceStore>,
        sink: Arc<dyn NotificationSink>,
        numbering: BillNumbering,
    ) -> Self {
        Self {
            bills,
            ledger,
            sink,
            numbering,
        }
    }

    /// Either a fully persisted bill or nothing at all.
    pub async fn generate(&self, actor: &Identity, req: GenerateBill) -> Result<Bill> {
        actor.require_owner()?;
        let (subscriber_id, subscriber_name) = validate_request(&req)?;

        let rows = self
            .ledger
            .fetch_attendance(&AttendanceFilter {
                subscriber_id: Some(subscriber_id.clone()),
                meal_type: None,
                range: DateRange::between(req.start_date, req.end_date),
            })
            .await?;

        let new_bill = build_snapshot(
            &subscriber_id,
            subscriber_name.as_deref(),
            req.start_date,
            req.end_date,
            &rows,
            &actor.actor(),
        )?;
        let bill = self.bills.insert_bill(new_bill, &self.numbering).await?;

        info!(
            bill_number = %bill.bill_number,
            subscriber = %bill.subscriber_id,
            meals = bill.total_meals,
            total = %bill.total,
            "bill/generated"
        );

        let notice = NewNotification::new(
            bill.subscriber_id.clone(),
            NotificationKind::Bill,
            "Bill Generated",
            format!(
                "Your bill for {} to {} has been generated. Total: {}",
                bill.start_date, bill.end_date, bill.total
            ),
        )
        .related(RelatedEntity::Bill(bill.id))
        .sent_by(actor.actor());
        self.sink.emit(notice).await;

        Ok(bill)
    }

    pub async fn get(&self, actor: &Identity, id: Uuid) -> Result<Bill> {
        let bill = self.load(id).await?;
        actor.require_self_or_owner(&bill.subscriber_id)?;
        Ok(bill)
    }

    /// Members only ever see their own bills, whatever the filter says.
    pub async fn list(&self, actor: &Identity, mut filter: BillFilter) -> Result<Vec<Bill>> {
        if !actor.is_owner() {
            filter.subscriber_id = Some(actor.subscriber_id.clone());
        }
        self.bills.list_bills(&filter).await
    }

    /// Pure read: the stored bill is never modified.
    pub async fn reconciled(&self, actor: &Identity, id: Uuid) -> Result<BillView> {
        let bill = self.get(actor, id).await?;
        let live = self
            .ledger
            .fetch_attendance(&AttendanceFilter {
                subscriber_id: Some(bill.subscriber_id.clone()),
                meal_type: None,
                range: DateRange::between(bill.start_date, bill.end_date),
            })
            .await?;
        let reconciliation = reconcile(&bill, &live);
        Ok(BillView {
            bill,
            reconciliation,
        })
    }

    /// Any status may move to any other.
    pub async fn update_status(
        &self,
        actor: &Identity,
        id: Uuid,
        status: BillStatus,
    ) -> Result<Bill> {
        actor.require_owner()?;
        let change = self
            .bills
            .update_bill_status(id, status)
            .await?
            .ok_or_else(|| TiffinError::not_found(format!("bill {id} not found")))?;

        info!(
            bill_number = %change.bill.bill_number,
            from = %change.previous,
            to = %change.bill.status,
            by = %actor.actor(),
            "bill/status_changed"
        );

        if change.previous != change.bill.status {
            let notice = NewNotification::new(
                change.bill.subscriber_id.clone(),
                NotificationKind::Bill,
                "Bill Updated",
                format!(
                    "Bill {} marked {}",
                    change.bill.bill_number, change.bill.status
                ),
            )
            .related(RelatedEntity::Bill(change.bill.id))
            .sent_by(actor.actor());
            self.sink.emit(notice).await;
        }
        Ok(change.bill)
    }

    async fn load(&self, id: Uuid) -> Result<Bill> {
        self.bills
            .get_bill(id)
            .await?
            .ok_or_else(|| TiffinError::not_found(format!("bill {id} not found")))
    }
}

/// A blank name counts as not supplied.
fn validate_request(req: &GenerateBill) -> Result<(SubscriberId, Option<String>)> {
    let mut v = Validator::new();
    let subscriber_id = match SubscriberId::parse(&req.subscriber_id) {
        Ok(id) => Some(id),
        Err(e) => {
            if let Some(other) = v.absorb("", e) {
                return Err(other);
            }
            None
        }
    };
    v.check(
        req.start_date <= req.end_date,
        "start_date",
        "Start date must not be after end date",
    );
    let subscriber_name = req
        .subscriber_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| check_name(&mut v, "subscriber_name", n));
    v.finish("Validation failed")?;

    let subscriber_id = subscriber_id.ok_or_else(|| {
        TiffinError::validation("subscriber_id", "Please enter a valid 10-digit phone number")
    })?;
    Ok((subscriber_id, subscriber_name))
}
