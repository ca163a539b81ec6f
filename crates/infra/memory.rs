//! In-process store implementing both repository traits.
//!
//! Enforces the same named constraints as the Postgres schema so that
//! use-case and HTTP tests exercise the conflict paths without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    entities::{
        customers::{CustomerEntity, InsertCustomerEntity},
        subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    },
    errors::{StoreError, StoreResult, constraints},
    repositories::{customers::CustomerRepository, subscriptions::SubscriptionRepository},
};

#[derive(Debug, Default)]
struct Tables {
    customers: HashMap<Uuid, CustomerEntity>,
    subscriptions: HashMap<Uuid, SubscriptionEntity>,
}

impl Tables {
    fn customer_by_user(&self, user_id: &str) -> Option<&CustomerEntity> {
        self.customers.values().find(|c| c.user_id == user_id)
    }

    fn subscription_by_provider_id(&self, provider_subscription_id: &str) -> Option<&SubscriptionEntity> {
        self.subscriptions
            .values()
            .find(|s| s.provider_subscription_id == provider_subscription_id)
    }

    fn subscription_by_pair(&self, user_id: &str, product_id: &str) -> Option<&SubscriptionEntity> {
        self.subscriptions
            .values()
            .find(|s| s.user_id == user_id && s.product_id == product_id)
    }

    fn check_subscription(&self, subscription: &UpsertSubscriptionEntity) -> StoreResult<()> {
        if !self.customers.contains_key(&subscription.customer_id) {
            return Err(StoreError::Fatal(format!(
                "{}: customer {} does not exist",
                constraints::SUBSCRIPTIONS_CUSTOMER_FK,
                subscription.customer_id
            )));
        }
        if let (Some(start), Some(end)) =
            (subscription.current_period_start, subscription.current_period_end)
        {
            if start > end {
                return Err(StoreError::Fatal(format!(
                    "{}: period start after end",
                    constraints::SUBSCRIPTIONS_PERIOD_CHECK
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn customer_count(&self) -> usize {
        self.tables.lock().await.customers.len()
    }

    pub async fn subscription_count(&self) -> usize {
        self.tables.lock().await.subscriptions.len()
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn get_customer_by_user_id(&self, user_id: &str) -> StoreResult<Option<CustomerEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables.customer_by_user(user_id).cloned())
    }

    async fn get_customer_by_provider_customer_id(
        &self,
        provider_customer_id: &str,
    ) -> StoreResult<Option<CustomerEntity>> {
        if provider_customer_id.is_empty() {
            return Ok(None);
        }
        let tables = self.tables.lock().await;
        Ok(tables
            .customers
            .values()
            .find(|c| c.provider_customer_id == provider_customer_id)
            .cloned())
    }

    async fn upsert_customer(
        &self,
        user_id: &str,
        email: &str,
        provider_customer_id: &str,
    ) -> StoreResult<CustomerEntity> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if !provider_customer_id.is_empty()
            && tables.customers.values().any(|c| {
                c.provider_customer_id == provider_customer_id && c.user_id != user_id
            })
        {
            return Err(StoreError::conflict(
                constraints::CUSTOMERS_PROVIDER_CUSTOMER_ID,
                format!("provider customer {provider_customer_id} belongs to another user"),
            ));
        }

        let customer = match tables.customer_by_user(user_id).cloned() {
            Some(existing) => CustomerEntity {
                email: email.to_string(),
                provider_customer_id: provider_customer_id.to_string(),
                updated_at: existing.updated_at.max(now),
                ..existing
            },
            None => {
                let insert = InsertCustomerEntity::new(user_id, email, provider_customer_id, now);
                CustomerEntity {
                    id: insert.id,
                    user_id: insert.user_id,
                    email: insert.email,
                    provider_customer_id: insert.provider_customer_id,
                    created_at: insert.created_at,
                    updated_at: insert.updated_at,
                }
            }
        };

        tables.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn get_subscription(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables.subscription_by_pair(user_id, product_id).cloned())
    }

    async fn get_subscription_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .subscription_by_provider_id(provider_subscription_id)
            .cloned())
    }

    async fn upsert_subscription_by_provider_id(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity> {
        let mut tables = self.tables.lock().await;
        tables.check_subscription(&subscription)?;
        let now = Utc::now();

        let existing = tables
            .subscription_by_provider_id(&subscription.provider_subscription_id)
            .cloned();

        if let Some(pair_owner) =
            tables.subscription_by_pair(&subscription.user_id, &subscription.product_id)
        {
            let same_row = existing.as_ref().is_some_and(|e| e.id == pair_owner.id);
            if !same_row {
                return Err(StoreError::conflict(
                    constraints::SUBSCRIPTIONS_USER_PRODUCT,
                    format!(
                        "user {} already holds product {}",
                        subscription.user_id, subscription.product_id
                    ),
                ));
            }
        }

        let insert = subscription.into_insert(now);
        let row = match existing {
            Some(existing) => SubscriptionEntity {
                customer_id: insert.customer_id,
                user_id: insert.user_id,
                product_id: insert.product_id,
                price_id: insert.price_id,
                status: insert.status,
                current_period_start: insert.current_period_start,
                current_period_end: insert.current_period_end,
                updated_at: existing.updated_at.max(now),
                ..existing
            },
            None => SubscriptionEntity {
                id: insert.id,
                customer_id: insert.customer_id,
                user_id: insert.user_id,
                product_id: insert.product_id,
                price_id: insert.price_id,
                provider_subscription_id: insert.provider_subscription_id,
                status: insert.status,
                current_period_start: insert.current_period_start,
                current_period_end: insert.current_period_end,
                created_at: insert.created_at,
                updated_at: insert.updated_at,
            },
        };

        tables.subscriptions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn rebind_subscription_pair(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity> {
        let mut tables = self.tables.lock().await;
        tables.check_subscription(&subscription)?;
        let now = Utc::now();

        let owner = tables
            .subscription_by_pair(&subscription.user_id, &subscription.product_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "no subscription for user {} and product {}",
                    subscription.user_id, subscription.product_id
                ))
            })?;

        tables.subscriptions.retain(|id, s| {
            *id == owner.id || s.provider_subscription_id != subscription.provider_subscription_id
        });

        let row = SubscriptionEntity {
            customer_id: subscription.customer_id,
            provider_subscription_id: subscription.provider_subscription_id,
            price_id: subscription.price_id,
            status: subscription.status.to_string(),
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            updated_at: owner.updated_at.max(now),
            ..owner
        };

        tables.subscriptions.insert(row.id, row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

    fn upsert(customer_id: Uuid, provider_id: &str, status: SubscriptionStatus) -> UpsertSubscriptionEntity {
        UpsertSubscriptionEntity {
            customer_id,
            user_id: "user-1".to_string(),
            product_id: "prod_basic".to_string(),
            price_id: "price_basic".to_string(),
            provider_subscription_id: provider_id.to_string(),
            status,
            current_period_start: None,
            current_period_end: None,
        }
    }

    #[tokio::test]
    async fn upsert_customer_keeps_identity_per_user() {
        let store = MemoryStore::new();

        let first = store.upsert_customer("user-1", "a@example.com", "").await.unwrap();
        let second = store
            .upsert_customer("user-1", "b@example.com", "cus_1")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "b@example.com");
        assert_eq!(second.provider_customer_id, "cus_1");
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.customer_count().await, 1);
    }

    #[tokio::test]
    async fn provider_customer_id_is_unique_across_users() {
        let store = MemoryStore::new();
        store.upsert_customer("user-1", "a@example.com", "cus_1").await.unwrap();

        let err = store
            .upsert_customer("user-2", "b@example.com", "cus_1")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::conflict(
                constraints::CUSTOMERS_PROVIDER_CUSTOMER_ID,
                "provider customer cus_1 belongs to another user"
            )
        );
    }

    #[tokio::test]
    async fn empty_provider_customer_ids_do_not_collide() {
        let store = MemoryStore::new();
        store.upsert_customer("user-1", "a@example.com", "").await.unwrap();
        store.upsert_customer("user-2", "b@example.com", "").await.unwrap();

        assert_eq!(store.customer_count().await, 2);
        assert!(store.get_customer_by_provider_customer_id("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subscription_upsert_updates_in_place() {
        let store = MemoryStore::new();
        let customer = store.upsert_customer("user-1", "a@example.com", "cus_1").await.unwrap();

        let created = store
            .upsert_subscription_by_provider_id(upsert(customer.id, "sub_1", SubscriptionStatus::Incomplete))
            .await
            .unwrap();
        let updated = store
            .upsert_subscription_by_provider_id(upsert(customer.id, "sub_1", SubscriptionStatus::Active))
            .await
            .unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.status(), Some(SubscriptionStatus::Active));
        assert_eq!(store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn second_provider_id_for_same_pair_conflicts_then_rebinds() {
        let store = MemoryStore::new();
        let customer = store.upsert_customer("user-1", "a@example.com", "cus_1").await.unwrap();
        let original = store
            .upsert_subscription_by_provider_id(upsert(customer.id, "sub_old", SubscriptionStatus::Canceled))
            .await
            .unwrap();

        let err = store
            .upsert_subscription_by_provider_id(upsert(customer.id, "sub_new", SubscriptionStatus::Active))
            .await
            .unwrap_err();
        assert!(err.is_user_product_conflict());

        let rebound = store
            .rebind_subscription_pair(upsert(customer.id, "sub_new", SubscriptionStatus::Active))
            .await
            .unwrap();

        assert_eq!(rebound.id, original.id);
        assert_eq!(rebound.provider_subscription_id, "sub_new");
        assert!(store.get_subscription_by_provider_id("sub_old").await.unwrap().is_none());
        assert_eq!(store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn rejects_unknown_customer_and_inverted_period() {
        let store = MemoryStore::new();
        let err = store
            .upsert_subscription_by_provider_id(upsert(Uuid::new_v4(), "sub_1", SubscriptionStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Fatal(_)));

        let customer = store.upsert_customer("user-1", "a@example.com", "cus_1").await.unwrap();
        let mut inverted = upsert(customer.id, "sub_1", SubscriptionStatus::Active);
        inverted.current_period_start = Some(Utc::now());
        inverted.current_period_end = Some(Utc::now() - chrono::Duration::days(1));

        let err = store.upsert_subscription_by_provider_id(inverted).await.unwrap_err();
        assert!(matches!(err, StoreError::Fatal(_)));
    }
}
