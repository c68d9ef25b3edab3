use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tfn_schemas::{
    Clock, Identity, NewNotification, NotificationKind, NotificationSink, Page, PageRequest,
    RelatedEntity, Result, Subscription, SubscriptionFilter, SubscriptionInput,
    SubscriptionPatch, SubscriptionStatus, TiffinError,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::lifecycle::{allowed_sources, apply_patch, check_transition, validate_input, EDITABLE};
use crate::stats::{self, SubscriptionStats};
use crate::store::SubscriptionStore;
use crate::SYSTEM_ACTOR;

pub const MAX_EXPIRING_WINDOW_DAYS: u32 = 365;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub id: Uuid,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Candidates matched by the expiry predicate.
    pub examined: usize,
    /// Transitioned by this invocation.
    pub expired: Vec<Uuid>,
    /// Matched, but another writer moved them first.
    pub already_handled: usize,
    pub failed: Vec<SweepFailure>,
}

#[derive(Clone)]
pub struct SubscriptionLifecycle {
    store: Arc<dyn SubscriptionStore>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
}

impl SubscriptionLifecycle {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { store, clock, sink }
    }

    pub async fn create(&self, actor: &Identity, input: SubscriptionInput) -> Result<Subscription> {
        actor.require_owner()?;
        let row = validate_input(&input, &actor.actor())?;
        let sub = self.store.insert_subscription(row).await?;

        info!(
            id = %sub.id,
            subscriber = %sub.subscriber_id,
            plan = %sub.plan,
            meals = sub.meals_included,
            "subscription/created"
        );
        let notice = NewNotification::new(
            sub.subscriber_id.clone(),
            NotificationKind::Subscription,
            "Subscription Created",
            format!(
                "Your {} subscription from {} to {} is active",
                sub.plan, sub.start_date, sub.end_date
            ),
        )
        .related(RelatedEntity::Subscription(sub.id))
        .sent_by(actor.actor());
        self.sink.emit(notice).await;
        Ok(sub)
    }

    pub async fn get(&self, actor: &Identity, id: Uuid) -> Result<Subscription> {
        let sub = self.load(id).await?;
        actor.require_self_or_owner(&sub.subscriber_id)?;
        Ok(sub)
    }

    pub async fn list(
        &self,
        actor: &Identity,
        mut filter: SubscriptionFilter,
        page: PageRequest,
    ) -> Result<Page<Subscription>> {
        if !actor.is_owner() {
            filter.subscriber_id = Some(actor.subscriber_id.clone());
        }
        self.store.list_subscriptions(&filter, page).await
    }

    pub async fn stats(&self, actor: &Identity, filter: SubscriptionFilter) -> Result<SubscriptionStats> {
        actor.require_owner()?;
        let rows = self.store.all_subscriptions(&filter).await?;
        Ok(stats::compute(&rows))
    }

    /// Edit plan, dates, price, meal allowance or name. Only live
    /// subscriptions can be edited; the write is conditional on the status
    /// still being live, so an edit racing the sweep loses with Conflict.
    pub async fn update(
        &self,
        actor: &Identity,
        id: Uuid,
        patch: SubscriptionPatch,
    ) -> Result<Subscription> {
        actor.require_owner()?;
        let current = self.load(id).await?;
        if current.status.is_terminal() {
            return Err(TiffinError::conflict(format!(
                "subscription is {}; terminal subscriptions cannot be edited",
                current.status
            )));
        }
        let terms = apply_patch(&current, &patch)?;

        let updated = self
            .store
            .update_subscription_terms(id, EDITABLE, terms)
            .await?
            .ok_or_else(|| {
                TiffinError::conflict(format!(
                    "subscription {id} changed concurrently; reload and retry"
                ))
            })?;

        info!(
            id = %updated.id,
            plan = %updated.plan,
            start = %updated.start_date,
            end = %updated.end_date,
            by = %actor.actor(),
            "subscription/updated"
        );
        let notice = NewNotification::new(
            updated.subscriber_id.clone(),
            NotificationKind::Subscription,
            "Subscription Updated",
            format!(
                "Your {} subscription now runs from {} to {} with {} meals for {}",
                updated.plan,
                updated.start_date,
                updated.end_date,
                updated.meals_included,
                updated.price
            ),
        )
        .related(RelatedEntity::Subscription(updated.id))
        .sent_by(actor.actor());
        self.sink.emit(notice).await;
        Ok(updated)
    }

    /// Explicit status change. Members may pause, resume or cancel their own
    /// subscriptions; only owners may expire one by hand.
    pub async fn set_status(
        &self,
        actor: &Identity,
        id: Uuid,
        to: SubscriptionStatus,
    ) -> Result<Subscription> {
        let current = self.load(id).await?;
        actor.require_self_or_owner(&current.subscriber_id)?;
        if to == SubscriptionStatus::Expired {
            actor.require_owner()?;
        }

        if current.status == to {
            return Ok(current);
        }
        check_transition(current.status, to)?;

        let updated = self
            .store
            .transition_subscription(id, allowed_sources(to), to)
            .await?
            .ok_or_else(|| {
                TiffinError::conflict(format!(
                    "subscription {id} changed concurrently; reload and retry"
                ))
            })?;

        info!(
            id = %updated.id,
            from = %current.status,
            to = %updated.status,
            by = %actor.actor(),
            "subscription/transitioned"
        );
        self.sink.emit(status_notice(&updated, &actor.actor())).await;
        Ok(updated)
    }

    /// Expire every active/paused subscription whose end date has passed.
    ///
    /// Idempotent: a row is notified only when this call's conditional write
    /// moved it. Per-row failures are collected and the sweep carries on.
    pub async fn sweep_expired(&self, today: NaiveDate) -> Result<SweepReport> {
        let candidates = self.store.list_expirable(today).await?;
        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for sub in candidates {
            match self
                .store
                .transition_subscription(
                    sub.id,
                    allowed_sources(SubscriptionStatus::Expired),
                    SubscriptionStatus::Expired,
                )
                .await
            {
                Ok(Some(expired)) => {
                    report.expired.push(expired.id);
                    self.sink.emit(status_notice(&expired, SYSTEM_ACTOR)).await;
                }
                Ok(None) => report.already_handled += 1,
                Err(e) => {
                    warn!(id = %sub.id, error = %e, "subscription/sweep_failed");
                    report.failed.push(SweepFailure {
                        id: sub.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            examined = report.examined,
            expired = report.expired.len(),
            already_handled = report.already_handled,
            failed = report.failed.len(),
            "subscription/sweep"
        );
        Ok(report)
    }

    /// Sweep using the service clock's business date.
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        self.sweep_expired(self.clock.today()).await
    }

    /// Active subscriptions ending within `[today, today + days]`.
    pub async fn list_expiring_within(&self, actor: &Identity, days: u32) -> Result<Vec<Subscription>> {
        actor.require_owner()?;
        if days > MAX_EXPIRING_WINDOW_DAYS {
            return Err(TiffinError::validation(
                "days",
                "Days must be between 0 and 365",
            ));
        }
        let today = self.clock.today();
        let until = today
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| TiffinError::validation("days", "window exceeds calendar range"))?;
        self.store.list_expiring(today, until).await
    }

    async fn load(&self, id: Uuid) -> Result<Subscription> {
        self.store
            .get_subscription(id)
            .await?
            .ok_or_else(|| TiffinError::not_found(format!("subscription {id} not found")))
    }
}

fn status_notice(sub: &Subscription, actor: &str) -> NewNotification {
    let (title, message) = match sub.status {
        SubscriptionStatus::Active => (
            "Subscription Resumed",
            format!("Your {} subscription has been resumed", sub.plan),
        ),
        SubscriptionStatus::Paused => (
            "Subscription Paused",
            format!("Your {} subscription has been paused", sub.plan),
        ),
        SubscriptionStatus::Expired => (
            "Subscription Expired",
            format!(
                "Your {} subscription ended on {} and has expired",
                sub.plan, sub.end_date
            ),
        ),
        SubscriptionStatus::Cancelled => (
            "Subscription Cancelled",
            format!("Your {} subscription has been cancelled", sub.plan),
        ),
    };
    NewNotification::new(
        sub.subscriber_id.clone(),
        NotificationKind::Subscription,
        title,
        message,
    )
    .related(RelatedEntity::Subscription(sub.id))
    .sent_by(actor)
}
