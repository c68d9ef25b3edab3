use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tfn_notify::NotificationStore;
use tfn_schemas::{
    NewNotification, Notification, NotificationKind, RelatedEntity, Result, SubscriberId,
};
use uuid::Uuid;

use crate::{decode, to_u64, PgStore};

const COLUMNS: &str =
    "id, subscriber_id, title, message, kind, read, related_kind, related_id, sent_by, created_at";

fn from_row(row: &PgRow) -> Result<Notification> {
    let related_kind: Option<String> = row.try_get("related_kind").context("notifications.related_kind")?;
    let related_id: Option<Uuid> = row.try_get("related_id").context("notifications.related_id")?;
    Ok(Notification {
        id: row.try_get("id").context("notifications.id")?,
        subscriber_id: decode(
            SubscriberId::parse(&row.try_get::<String, _>("subscriber_id").context("notifications.subscriber_id")?),
            "notifications.subscriber_id",
        )?,
        title: row.try_get("title").context("notifications.title")?,
        message: row.try_get("message").context("notifications.message")?,
        kind: decode(
            NotificationKind::parse(&row.try_get::<String, _>("kind").context("notifications.kind")?),
            "notifications.kind",
        )?,
        read: row.try_get("read").context("notifications.read")?,
        related: RelatedEntity::from_parts(related_kind.as_deref(), related_id)?,
        sent_by: row.try_get("sent_by").context("notifications.sent_by")?,
        created_at: row.try_get("created_at").context("notifications.created_at")?,
    })
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, n: NewNotification) -> Result<Notification> {
        let row = sqlx::query(&format!(
            r#"
            insert into notifications (id, subscriber_id, title, message, kind, related_kind, related_id, sent_by)
            values ($1, $2, $3, $4, $5, $6, $7, $8)
            returning {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(n.subscriber_id.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.kind.as_str())
        .bind(n.related.map(|r| r.kind_str()))
        .bind(n.related.map(|r| r.id()))
        .bind(&n.sent_by)
        .fetch_one(&self.pool)
        .await
        .context("insert notification failed")?;
        from_row(&row)
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!("select {COLUMNS} from notifications where id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("get notification failed")?;
        row.as_ref().map(from_row).transpose()
    }

    async fn list_notifications(
        &self,
        subscriber: &SubscriberId,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            r#"
            select {COLUMNS} from notifications
            where subscriber_id = $1
            order by created_at desc, id
            limit $2
            "#
        ))
        .bind(subscriber.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("list notifications failed")?;
        rows.iter().map(from_row).collect()
    }

    async fn unread_count(&self, subscriber: &SubscriberId) -> Result<u64> {
        let (n,): (i64,) =
            sqlx::query_as("select count(*) from notifications where subscriber_id = $1 and not read")
                .bind(subscriber.as_str())
                .fetch_one(&self.pool)
                .await
                .context("unread count failed")?;
        to_u64(n, "count")
    }

    async fn mark_read(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!(
            "update notifications set read = true where id = $1 returning {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("mark read failed")?;
        row.as_ref().map(from_row).transpose()
    }

    async fn mark_all_read(&self, subscriber: &SubscriberId) -> Result<u64> {
        let res = sqlx::query("update notifications set read = true where subscriber_id = $1 and not read")
            .bind(subscriber.as_str())
            .execute(&self.pool)
            .await
            .context("mark all read failed")?;
        Ok(res.rows_affected())
    }
}
