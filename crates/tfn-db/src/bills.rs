use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use tfn_billing::{BillNumbering, BillStatusChange, BillStore};
use tfn_schemas::{Bill, BillEntry, BillFilter, BillStatus, NewBill, Paise, Result, SubscriberId};
use tracing::debug;
use uuid::Uuid;

use crate::{decode, to_u32, to_u64, PgStore};

const COLUMNS: &str = "id, bill_number, subscriber_id, subscriber_name, start_date, end_date, \
                       total_meals, total_paise, entries, status, generated_by, created_at, updated_at";

fn from_row(row: &PgRow) -> Result<Bill> {
    let Json(entries): Json<Vec<BillEntry>> = row.try_get("entries").context("bills.entries")?;
    Ok(Bill {
        id: row.try_get("id").context("bills.id")?,
        bill_number: row.try_get("bill_number").context("bills.bill_number")?,
        subscriber_id: decode(
            SubscriberId::parse(&row.try_get::<String, _>("subscriber_id").context("bills.subscriber_id")?),
            "bills.subscriber_id",
        )?,
        subscriber_name: row.try_get("subscriber_name").context("bills.subscriber_name")?,
        start_date: row.try_get("start_date").context("bills.start_date")?,
        end_date: row.try_get("end_date").context("bills.end_date")?,
        total_meals: to_u32(row.try_get("total_meals").context("bills.total_meals")?, "bills.total_meals")?,
        total: Paise(row.try_get("total_paise").context("bills.total_paise")?),
        entries,
        status: decode(
            BillStatus::parse(&row.try_get::<String, _>("status").context("bills.status")?),
            "bills.status",
        )?,
        generated_by: row.try_get("generated_by").context("bills.generated_by")?,
        created_at: row.try_get("created_at").context("bills.created_at")?,
        updated_at: row.try_get("updated_at").context("bills.updated_at")?,
    })
}

#[async_trait]
impl BillStore for PgStore {
    async fn insert_bill(&self, bill: NewBill, numbering: &BillNumbering) -> Result<Bill> {
        let mut tx = self.pool.begin().await.context("begin bill insert failed")?;

        // Row lock on the counter serializes concurrent generators until commit.
        let (seq,): (i64,) = sqlx::query_as(
            "update counters set value = value + 1 where name = 'bill_number' returning value",
        )
        .fetch_one(&mut *tx)
        .await
        .context("bill_number counter missing; run migrations")?;
        let bill_number = numbering.format(to_u64(seq, "counters.value")?);

        let row = sqlx::query(&format!(
            r#"
            insert into bills (id, seq, bill_number, subscriber_id, subscriber_name, start_date, end_date,
                               total_meals, total_paise, entries, generated_by)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            returning {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(seq)
        .bind(&bill_number)
        .bind(bill.subscriber_id.as_str())
        .bind(&bill.subscriber_name)
        .bind(bill.start_date)
        .bind(bill.end_date)
        .bind(i32::try_from(bill.total_meals).context("total_meals out of range")?)
        .bind(bill.total.as_i64())
        .bind(Json(&bill.entries))
        .bind(&bill.generated_by)
        .fetch_one(&mut *tx)
        .await
        .context("insert bill failed")?;

        let stored = from_row(&row)?;
        tx.commit().await.context("commit bill insert failed")?;
        debug!(seq, bill_number = %stored.bill_number, "db/bill_inserted");
        Ok(stored)
    }

    async fn get_bill(&self, id: Uuid) -> Result<Option<Bill>> {
        let row = sqlx::query(&format!("select {COLUMNS} from bills where id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("get bill failed")?;
        row.as_ref().map(from_row).transpose()
    }

    async fn list_bills(&self, filter: &BillFilter) -> Result<Vec<Bill>> {
        let rows = sqlx::query(&format!(
            r#"
            select {COLUMNS} from bills
            where ($1::text is null or subscriber_id = $1)
              and ($2::text is null or status = $2)
            order by seq desc
            "#
        ))
        .bind(filter.subscriber_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .context("list bills failed")?;
        rows.iter().map(from_row).collect()
    }

    async fn update_bill_status(
        &self,
        id: Uuid,
        status: BillStatus,
    ) -> Result<Option<BillStatusChange>> {
        let row = sqlx::query(
            r#"
            with old as (
                select id, status from bills where id = $1 for update
            )
            update bills b
               set status = $2, updated_at = now()
              from old
             where b.id = old.id
            returning old.status as previous_status,
                      b.id, b.bill_number, b.subscriber_id, b.subscriber_name, b.start_date, b.end_date,
                      b.total_meals, b.total_paise, b.entries, b.status, b.generated_by,
                      b.created_at, b.updated_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("update bill status failed")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let previous = decode(
            BillStatus::parse(&row.try_get::<String, _>("previous_status").context("bills.previous_status")?),
            "bills.status",
        )?;
        Ok(Some(BillStatusChange {
            previous,
            bill: from_row(&row)?,
        }))
    }
}
