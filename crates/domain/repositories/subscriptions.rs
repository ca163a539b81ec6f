use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    errors::StoreResult,
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn get_subscription(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>>;

    async fn get_subscription_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>>;

    /// Insert-or-update keyed by `provider_subscription_id`. Fails with a
    /// conflict when another row already owns `(user_id, product_id)`.
    async fn upsert_subscription_by_provider_id(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity>;

    /// Moves the row owning `(user_id, product_id)` onto the new provider
    /// subscription id, removing any other row that held that id.
    async fn rebind_subscription_pair(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity>;
}
