use std::{collections::HashMap, sync::Arc};

use crates::domain::{
    entities::customers::CustomerEntity,
    repositories::{customers::CustomerRepository, payment_gateway::PaymentGateway},
    value_objects::payments::METADATA_USER_ID,
};
use tracing::{error, info};

use super::errors::UseCaseResult;

/// Maps a local user onto exactly one provider customer, creating it on first use.
pub struct CustomerResolver<C, G>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    customer_repo: Arc<C>,
    gateway: Arc<G>,
}

impl<C, G> CustomerResolver<C, G>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(customer_repo: Arc<C>, gateway: Arc<G>) -> Self {
        Self {
            customer_repo,
            gateway,
        }
    }

    pub async fn find(&self, user_id: &str) -> UseCaseResult<Option<CustomerEntity>> {
        let customer = self
            .customer_repo
            .get_customer_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "customers: failed to load customer");
                err
            })?;
        Ok(customer)
    }

    pub async fn resolve(&self, user_id: &str, email: &str) -> UseCaseResult<String> {
        if let Some(customer) = self.find(user_id).await? {
            if customer.has_provider_customer() {
                if customer.email != email {
                    info!(%user_id, "customers: updating stored email");
                    self.customer_repo
                        .upsert_customer(user_id, email, &customer.provider_customer_id)
                        .await?;
                }
                return Ok(customer.provider_customer_id);
            }
            info!(%user_id, "customers: stored customer has no provider id, creating one");
        }

        let metadata = HashMap::from([(METADATA_USER_ID.to_string(), user_id.to_string())]);
        let provider_customer_id = self
            .gateway
            .create_customer(email, metadata)
            .await
            .map_err(|err| {
                error!(%user_id, provider_error = ?err, "customers: failed to create provider customer");
                err
            })?;

        self.customer_repo
            .upsert_customer(user_id, email, &provider_customer_id)
            .await
            .map_err(|err| {
                error!(%user_id, %provider_customer_id, db_error = ?err, "customers: failed to store customer");
                err
            })?;

        info!(%user_id, %provider_customer_id, "customers: provider customer created");
        Ok(provider_customer_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use crates::{
        domain::{
            errors::GatewayError,
            repositories::{customers::MockCustomerRepository, payment_gateway::MockPaymentGateway},
        },
        infra::memory::MemoryStore,
    };
    use uuid::Uuid;

    use super::*;
    use crate::usecases::errors::UseCaseError;

    fn customer(user_id: &str, email: &str, provider_customer_id: &str) -> CustomerEntity {
        let now = Utc::now();
        CustomerEntity {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            provider_customer_id: provider_customer_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn returns_existing_provider_customer_without_calling_provider() {
        let mut customer_repo = MockCustomerRepository::new();
        let gateway = MockPaymentGateway::new();

        let existing = customer("u1", "a@b.co", "cus_1");
        customer_repo
            .expect_get_customer_by_user_id()
            .withf(|user_id| user_id == "u1")
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        customer_repo.expect_upsert_customer().never();

        let resolver = CustomerResolver::new(Arc::new(customer_repo), Arc::new(gateway));
        assert_eq!(resolver.resolve("u1", "a@b.co").await.unwrap(), "cus_1");
    }

    #[tokio::test]
    async fn updates_email_when_it_changed() {
        let mut customer_repo = MockCustomerRepository::new();
        let gateway = MockPaymentGateway::new();

        let existing = customer("u1", "old@b.co", "cus_1");
        let updated = customer("u1", "new@b.co", "cus_1");
        customer_repo
            .expect_get_customer_by_user_id()
            .returning(move |_| Ok(Some(existing.clone())));
        customer_repo
            .expect_upsert_customer()
            .withf(|user_id, email, provider_customer_id| {
                user_id == "u1" && email == "new@b.co" && provider_customer_id == "cus_1"
            })
            .times(1)
            .returning(move |_, _, _| Ok(updated.clone()));

        let resolver = CustomerResolver::new(Arc::new(customer_repo), Arc::new(gateway));
        assert_eq!(resolver.resolve("u1", "new@b.co").await.unwrap(), "cus_1");
    }

    #[tokio::test]
    async fn creates_provider_customer_for_new_user() {
        let store = Arc::new(MemoryStore::new());
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .withf(|email, metadata| {
                email == "a@b.co" && metadata.get("user_id").map(String::as_str) == Some("u1")
            })
            .times(1)
            .returning(|_, _| Ok("cus_new".to_string()));

        let resolver = CustomerResolver::new(store.clone(), Arc::new(gateway));

        assert_eq!(resolver.resolve("u1", "a@b.co").await.unwrap(), "cus_new");
        let stored = store.get_customer_by_user_id("u1").await.unwrap().unwrap();
        assert_eq!(stored.provider_customer_id, "cus_new");

        // second call reuses the mapping; the mock would fail on a second create
        assert_eq!(resolver.resolve("u1", "a@b.co").await.unwrap(), "cus_new");
    }

    #[tokio::test]
    async fn repairs_row_left_without_provider_id() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_customer("u1", "a@b.co", "").await.unwrap();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .times(1)
            .returning(|_, _| Ok("cus_fixed".to_string()));

        let resolver = CustomerResolver::new(store.clone(), Arc::new(gateway));

        assert_eq!(resolver.resolve("u1", "a@b.co").await.unwrap(), "cus_fixed");
        assert_eq!(store.customer_count().await, 1);
    }

    #[tokio::test]
    async fn provider_outage_is_surfaced() {
        let store = Arc::new(MemoryStore::new());
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .returning(|_, _| Err(GatewayError::Transient("503".into())));

        let resolver = CustomerResolver::new(store.clone(), Arc::new(gateway));
        let err = resolver.resolve("u1", "a@b.co").await.unwrap_err();

        assert!(matches!(err, UseCaseError::Gateway(GatewayError::Transient(_))));
        assert_eq!(store.customer_count().await, 0);
    }
}
