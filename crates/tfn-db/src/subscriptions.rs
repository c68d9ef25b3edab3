use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tfn_schemas::{
    NewSubscription, Page, PageRequest, Paise, Plan, Result, SubscriberId, Subscription,
    SubscriptionFilter, SubscriptionStatus, SubscriptionTerms,
};
use tfn_subscription::SubscriptionStore;
use uuid::Uuid;

use crate::{decode, to_i64, to_u32, to_u64, PgStore};

const COLUMNS: &str = "id, subscriber_id, subscriber_name, plan, start_date, end_date, price_paise, \
                       meals_included, status, created_by, created_at, updated_at";

const FILTER_SQL: &str = r#"
    ($1::text is null or subscriber_id = $1)
    and ($2::text is null or status = $2)
    and ($3::text is null or plan = $3)
"#;

fn from_row(row: &PgRow) -> Result<Subscription> {
    Ok(Subscription {
        id: row.try_get("id").context("subscriptions.id")?,
        subscriber_id: decode(
            SubscriberId::parse(&row.try_get::<String, _>("subscriber_id").context("subscriptions.subscriber_id")?),
            "subscriptions.subscriber_id",
        )?,
        subscriber_name: row.try_get("subscriber_name").context("subscriptions.subscriber_name")?,
        plan: decode(
            Plan::parse(&row.try_get::<String, _>("plan").context("subscriptions.plan")?),
            "subscriptions.plan",
        )?,
        start_date: row.try_get("start_date").context("subscriptions.start_date")?,
        end_date: row.try_get("end_date").context("subscriptions.end_date")?,
        price: Paise(row.try_get("price_paise").context("subscriptions.price_paise")?),
        meals_included: to_u32(
            row.try_get("meals_included").context("subscriptions.meals_included")?,
            "subscriptions.meals_included",
        )?,
        status: decode(
            SubscriptionStatus::parse(&row.try_get::<String, _>("status").context("subscriptions.status")?),
            "subscriptions.status",
        )?,
        created_by: row.try_get("created_by").context("subscriptions.created_by")?,
        created_at: row.try_get("created_at").context("subscriptions.created_at")?,
        updated_at: row.try_get("updated_at").context("subscriptions.updated_at")?,
    })
}

struct FilterBinds {
    subscriber: Option<String>,
    status: Option<&'static str>,
    plan: Option<&'static str>,
}

impl From<&SubscriptionFilter> for FilterBinds {
    fn from(f: &SubscriptionFilter) -> Self {
        Self {
            subscriber: f.subscriber_id.as_ref().map(|s| s.as_str().to_string()),
            status: f.status.map(|s| s.as_str()),
            plan: f.plan.map(|p| p.as_str()),
        }
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn insert_subscription(&self, row: NewSubscription) -> Result<Subscription> {
        let r = sqlx::query(&format!(
            r#"
            insert into subscriptions (id, subscriber_id, subscriber_name, plan, start_date, end_date,
                                       price_paise, meals_included, created_by)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            returning {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(row.subscriber_id.as_str())
        .bind(&row.subscriber_name)
        .bind(row.plan.as_str())
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.price.as_i64())
        .bind(i32::try_from(row.meals_included).context("meals_included out of range")?)
        .bind(&row.created_by)
        .fetch_one(&self.pool)
        .await
        .context("insert subscription failed")?;
        from_row(&r)
    }

    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query(&format!("select {COLUMNS} from subscriptions where id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("get subscription failed")?;
        row.as_ref().map(from_row).transpose()
    }

    async fn list_subscriptions(
        &self,
        filter: &SubscriptionFilter,
        page: PageRequest,
    ) -> Result<Page<Subscription>> {
        let b = FilterBinds::from(filter);

        let (total,): (i64,) = sqlx::query_as(&format!("select count(*) from subscriptions where {FILTER_SQL}"))
            .bind(&b.subscriber)
            .bind(b.status)
            .bind(b.plan)
            .fetch_one(&self.pool)
            .await
            .context("count subscriptions failed")?;

        let rows = sqlx::query(&format!(
            r#"
            select {COLUMNS} from subscriptions
            where {FILTER_SQL}
            order by start_date desc, created_at desc, id
            limit $4 offset $5
            "#
        ))
        .bind(&b.subscriber)
        .bind(b.status)
        .bind(b.plan)
        .bind(to_i64(page.limit()))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.pool)
        .await
        .context("list subscriptions failed")?;

        let items = rows.iter().map(from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, page, to_u64(total, "count")?))
    }

    async fn all_subscriptions(&self, filter: &SubscriptionFilter) -> Result<Vec<Subscription>> {
        let b = FilterBinds::from(filter);
        let rows = sqlx::query(&format!(
            r#"
            select {COLUMNS} from subscriptions
            where {FILTER_SQL}
            order by start_date desc, created_at desc, id
            "#
        ))
        .bind(&b.subscriber)
        .bind(b.status)
        .bind(b.plan)
        .fetch_all(&self.pool)
        .await
        .context("all subscriptions failed")?;
        rows.iter().map(from_row).collect()
    }

    async fn list_expirable(&self, today: NaiveDate) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            select {COLUMNS} from subscriptions
            where status in ('active', 'paused') and end_date < $1
            order by end_date, id
            "#
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .context("list expirable subscriptions failed")?;
        rows.iter().map(from_row).collect()
    }

    async fn list_expiring(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            select {COLUMNS} from subscriptions
            where status = 'active' and end_date between $1 and $2
            order by end_date, id
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("list expiring subscriptions failed")?;
        rows.iter().map(from_row).collect()
    }

    async fn transition_subscription(
        &self,
        id: Uuid,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> Result<Option<Subscription>> {
        let sources: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let row = sqlx::query(&format!(
            r#"
            update subscriptions
               set status = $3, updated_at = now()
             where id = $1 and status = any($2)
            returning {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&sources)
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("transition subscription failed")?;
        row.as_ref().map(from_row).transpose()
    }

    async fn update_subscription_terms(
        &self,
        id: Uuid,
        from: &[SubscriptionStatus],
        terms: SubscriptionTerms,
    ) -> Result<Option<Subscription>> {
        let sources: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let row = sqlx::query(&format!(
            r#"
            update subscriptions
               set subscriber_name = $3, plan = $4, start_date = $5, end_date = $6,
                   price_paise = $7, meals_included = $8, updated_at = now()
             where id = $1 and status = any($2)
            returning {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&sources)
        .bind(&terms.subscriber_name)
        .bind(terms.plan.as_str())
        .bind(terms.start_date)
        .bind(terms.end_date)
        .bind(terms.price.as_i64())
        .bind(i32::try_from(terms.meals_included).context("meals_included out of range")?)
        .fetch_optional(&self.pool)
        .await
        .context("update subscription terms failed")?;
        row.as_ref().map(from_row).transpose()
    }
}
