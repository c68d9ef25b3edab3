use async_trait::async_trait;
use chrono::NaiveDate;
use tfn_schemas::{
    NewSubscription, Page, PageRequest, Result, Subscription, SubscriptionFilter,
    SubscriptionStatus, SubscriptionTerms,
};
use uuid::Uuid;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Stored with status `active`.
    async fn insert_subscription(&self, row: NewSubscription) -> Result<Subscription>;

    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>>;

    /// Sorted by start date desc.
    async fn list_subscriptions(
        &self,
        filter: &SubscriptionFilter,
        page: PageRequest,
    ) -> Result<Page<Subscription>>;

    /// Every match, unpaged.
    async fn all_subscriptions(&self, filter: &SubscriptionFilter) -> Result<Vec<Subscription>>;

    /// Status active or paused and `end_date < today`.
    async fn list_expirable(&self, today: NaiveDate) -> Result<Vec<Subscription>>;

    /// Status active and `end_date` in `[from, to]`, soonest first.
    async fn list_expiring(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Subscription>>;

    /// Atomic conditional write: set `to` only if the current status is one
    /// of `from`. Returns the updated row, or `None` when the precondition
    /// did not hold (or the row is gone).
    async fn transition_subscription(
        &self,
        id: Uuid,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> Result<Option<Subscription>>;

    /// Conditional like [`transition_subscription`](Self::transition_subscription):
    /// overwrite the terms only while the status is one of `from`.
    async fn update_subscription_terms(
        &self,
        id: Uuid,
        from: &[SubscriptionStatus],
        terms: SubscriptionTerms,
    ) -> Result<Option<Subscription>>;
}
