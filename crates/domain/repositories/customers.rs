use async_trait::async_trait;
use mockall::automock;

use crate::domain::{entities::customers::CustomerEntity, errors::StoreResult};

#[automock]
#[async_trait]
pub trait CustomerRepository {
    async fn get_customer_by_user_id(&self, user_id: &str) -> StoreResult<Option<CustomerEntity>>;

    async fn get_customer_by_provider_customer_id(
        &self,
        provider_customer_id: &str,
    ) -> StoreResult<Option<CustomerEntity>>;

    /// Inserts or updates the row keyed by `user_id`. An empty
    /// `provider_customer_id` records a user whose provider customer does not
    /// exist yet.
    async fn upsert_customer(
        &self,
        user_id: &str,
        email: &str,
        provider_customer_id: &str,
    ) -> StoreResult<CustomerEntity>;
}
