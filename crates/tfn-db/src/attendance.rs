use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tfn_ledger::AttendanceStore;
use tfn_schemas::{
    AttendanceFilter, AttendanceKey, AttendanceRecord, MealType, NewAttendance, Page, PageRequest,
    Paise, Result, SubscriberId, TiffinError,
};
use uuid::Uuid;

use crate::{decode, is_unique_constraint_violation, to_i64, to_u64, PgStore};

const UQ_IDENTITY: &str = "uq_attendance_identity";

const COLUMNS: &str = "id, subscriber_id, subscriber_name, meal_type, meal_date, price_paise, recorded_by, created_at";

fn from_row(row: &PgRow) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.try_get("id").context("attendance.id")?,
        subscriber_id: decode(
            SubscriberId::parse(&row.try_get::<String, _>("subscriber_id").context("attendance.subscriber_id")?),
            "attendance.subscriber_id",
        )?,
        subscriber_name: row.try_get("subscriber_name").context("attendance.subscriber_name")?,
        meal_type: decode(
            MealType::parse(&row.try_get::<String, _>("meal_type").context("attendance.meal_type")?),
            "attendance.meal_type",
        )?,
        date: row.try_get("meal_date").context("attendance.meal_date")?,
        price: Paise(row.try_get("price_paise").context("attendance.price_paise")?),
        recorded_by: row.try_get("recorded_by").context("attendance.recorded_by")?,
        created_at: row.try_get("created_at").context("attendance.created_at")?,
    })
}

fn duplicate(row: &NewAttendance) -> TiffinError {
    TiffinError::Conflict {
        message: "attendance identity already exists".to_string(),
        duplicates: vec![row.label()],
    }
}

async fn insert_one<'e, E>(exec: E, row: &NewAttendance) -> std::result::Result<PgRow, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(&format!(
        r#"
        insert into attendance (id, subscriber_id, subscriber_name, meal_type, meal_date, price_paise, recorded_by)
        values ($1, $2, $3, $4, $5, $6, $7)
        returning {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(row.subscriber_id.as_str())
    .bind(&row.subscriber_name)
    .bind(row.meal_type.as_str())
    .bind(row.date)
    .bind(row.price.as_i64())
    .bind(&row.recorded_by)
    .fetch_one(exec)
    .await
}

/// `($1::text is null or ...)` keeps one statement for every filter shape.
const FILTER_SQL: &str = r#"
    ($1::text is null or subscriber_id = $1)
    and ($2::text is null or meal_type = $2)
    and ($3::date is null or meal_date >= $3)
    and ($4::date is null or meal_date <= $4)
"#;

#[async_trait]
impl AttendanceStore for PgStore {
    async fn insert_attendance(&self, row: NewAttendance) -> Result<AttendanceRecord> {
        match insert_one(&self.pool, &row).await {
            Ok(r) => from_row(&r),
            Err(e) if is_unique_constraint_violation(&e, UQ_IDENTITY) => Err(duplicate(&row)),
            Err(e) => Err(anyhow::Error::new(e).context("insert attendance failed").into()),
        }
    }

    async fn insert_attendance_batch(&self, rows: Vec<NewAttendance>) -> Result<Vec<AttendanceRecord>> {
        let mut tx = self.pool.begin().await.context("begin attendance batch failed")?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match insert_one(&mut *tx, row).await {
                Ok(r) => out.push(from_row(&r)?),
                // dropping `tx` rolls back every row inserted so far
                Err(e) if is_unique_constraint_violation(&e, UQ_IDENTITY) => return Err(duplicate(row)),
                Err(e) => return Err(anyhow::Error::new(e).context("insert attendance batch failed").into()),
            }
        }
        tx.commit().await.context("commit attendance batch failed")?;
        Ok(out)
    }

    async fn find_existing_attendance(&self, keys: &[AttendanceKey]) -> Result<Vec<AttendanceRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let subscribers: Vec<String> = keys.iter().map(|k| k.subscriber_id.to_string()).collect();
        let meals: Vec<String> = keys.iter().map(|k| k.meal_type.as_str().to_string()).collect();
        let dates: Vec<NaiveDate> = keys.iter().map(|k| k.date).collect();

        let rows = sqlx::query(
            r#"
            select distinct a.id, a.subscriber_id, a.subscriber_name, a.meal_type, a.meal_date,
                   a.price_paise, a.recorded_by, a.created_at
            from attendance a
            join unnest($1::text[], $2::text[], $3::date[]) as k(subscriber_id, meal_type, meal_date)
              on a.subscriber_id = k.subscriber_id
             and a.meal_type = k.meal_type
             and a.meal_date = k.meal_date
            order by a.meal_date, a.meal_type
            "#,
        )
        .bind(&subscribers)
        .bind(&meals)
        .bind(&dates)
        .fetch_all(&self.pool)
        .await
        .context("find existing attendance failed")?;

        rows.iter().map(from_row).collect()
    }

    async fn get_attendance(&self, id: Uuid) -> Result<Option<AttendanceRecord>> {
        let row = sqlx::query(&format!("select {COLUMNS} from attendance where id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("get attendance failed")?;
        row.as_ref().map(from_row).transpose()
    }

    async fn query_attendance(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>> {
        let subscriber = filter.subscriber_id.as_ref().map(|s| s.as_str().to_string());
        let meal = filter.meal_type.map(|m| m.as_str());

        let (total,): (i64,) = sqlx::query_as(&format!("select count(*) from attendance where {FILTER_SQL}"))
            .bind(&subscriber)
            .bind(meal)
            .bind(filter.range.from)
            .bind(filter.range.to)
            .fetch_one(&self.pool)
            .await
            .context("count attendance failed")?;

        let rows = sqlx::query(&format!(
            r#"
            select {COLUMNS} from attendance
            where {FILTER_SQL}
            order by meal_date desc, meal_type asc, id
            limit $5 offset $6
            "#
        ))
        .bind(&subscriber)
        .bind(meal)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .bind(to_i64(page.limit()))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.pool)
        .await
        .context("query attendance failed")?;

        let items = rows.iter().map(from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, page, to_u64(total, "count")?))
    }

    async fn fetch_attendance(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            select {COLUMNS} from attendance
            where {FILTER_SQL}
            order by meal_date asc, meal_type asc, id
            "#
        ))
        .bind(filter.subscriber_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(filter.meal_type.map(|m| m.as_str()))
        .bind(filter.range.from)
        .bind(filter.range.to)
        .fetch_all(&self.pool)
        .await
        .context("fetch attendance failed")?;

        rows.iter().map(from_row).collect()
    }

    async fn update_attendance(&self, id: Uuid, row: NewAttendance) -> Result<Option<AttendanceRecord>> {
        let updated = sqlx::query(&format!(
            r#"
            update attendance
               set subscriber_id = $2, subscriber_name = $3, meal_type = $4,
                   meal_date = $5, price_paise = $6
             where id = $1
            returning {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(row.subscriber_id.as_str())
        .bind(&row.subscriber_name)
        .bind(row.meal_type.as_str())
        .bind(row.date)
        .bind(row.price.as_i64())
        .fetch_optional(&self.pool)
        .await;

        match updated {
            Ok(r) => r.as_ref().map(from_row).transpose(),
            Err(e) if is_unique_constraint_violation(&e, UQ_IDENTITY) => Err(duplicate(&row)),
            Err(e) => Err(anyhow::Error::new(e).context("update attendance failed").into()),
        }
    }

    async fn delete_attendance(&self, id: Uuid) -> Result<Option<AttendanceRecord>> {
        let row = sqlx::query(&format!("delete from attendance where id = $1 returning {COLUMNS}"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("delete attendance failed")?;
        row.as_ref().map(from_row).transpose()
    }
}
