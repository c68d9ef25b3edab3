use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfn_schemas::{Bill, BillFilter, BillStatus, NewBill, Result};
use uuid::Uuid;

use crate::BillNumbering;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillStatusChange {
    pub previous: BillStatus,
    pub bill: Bill,
}

#[async_trait]
pub trait BillStore: Send + Sync {
    /// Draw the next value from the bill-number counter and insert the bill
    /// in the same transaction. Numbers are never reused or skipped.
    async fn insert_bill(&self, bill: NewBill, numbering: &BillNumbering) -> Result<Bill>;

    async fn get_bill(&self, id: Uuid) -> Result<Option<Bill>>;

    /// Newest first.
    async fn list_bills(&self, filter: &BillFilter) -> Result<Vec<Bill>>;

    /// `None` if the bill does not exist.
    async fn update_bill_status(&self, id: Uuid, status: BillStatus)
        -> Result<Option<BillStatusChange>>;
}
