use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    Connection, OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*, update,
    upsert::excluded,
};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::{PgPoolSquad, interact},
        schema::subscriptions,
        sql_functions::greatest,
    },
};
use domain::{
    entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    errors::{StoreError, StoreResult},
    repositories::subscriptions::SubscriptionRepository,
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn get_subscription(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>> {
        let user_id = user_id.to_string();
        let product_id = product_id.to_string();

        interact(&self.db_pool, move |conn| {
            let subscription = subscriptions::table
                .filter(subscriptions::user_id.eq(&user_id))
                .filter(subscriptions::product_id.eq(&product_id))
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()?;
            Ok(subscription)
        })
        .await
    }

    async fn get_subscription_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>> {
        let provider_subscription_id = provider_subscription_id.to_string();

        interact(&self.db_pool, move |conn| {
            let subscription = subscriptions::table
                .filter(subscriptions::provider_subscription_id.eq(&provider_subscription_id))
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()?;
            Ok(subscription)
        })
        .await
    }

    async fn upsert_subscription_by_provider_id(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity> {
        let insert_entity = subscription.into_insert(Utc::now());

        interact(&self.db_pool, move |conn| {
            let row = insert_into(subscriptions::table)
                .values(&insert_entity)
                .on_conflict(subscriptions::provider_subscription_id)
                .do_update()
                .set((
                    subscriptions::customer_id.eq(excluded(subscriptions::customer_id)),
                    subscriptions::user_id.eq(excluded(subscriptions::user_id)),
                    subscriptions::product_id.eq(excluded(subscriptions::product_id)),
                    subscriptions::price_id.eq(excluded(subscriptions::price_id)),
                    subscriptions::status.eq(excluded(subscriptions::status)),
                    subscriptions::current_period_start
                        .eq(excluded(subscriptions::current_period_start)),
                    subscriptions::current_period_end
                        .eq(excluded(subscriptions::current_period_end)),
                    subscriptions::updated_at.eq(greatest(
                        subscriptions::updated_at,
                        excluded(subscriptions::updated_at),
                    )),
                ))
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(conn)?;
            Ok(row)
        })
        .await
    }

    async fn rebind_subscription_pair(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity> {
        let now = Utc::now();

        interact(&self.db_pool, move |conn| {
            conn.transaction::<SubscriptionEntity, StoreError, _>(|conn| {
                let owner = subscriptions::table
                    .filter(subscriptions::user_id.eq(&subscription.user_id))
                    .filter(subscriptions::product_id.eq(&subscription.product_id))
                    .select(SubscriptionEntity::as_select())
                    .for_update()
                    .first::<SubscriptionEntity>(conn)
                    .optional()?
                    .ok_or_else(|| {
                        StoreError::NotFound(format!(
                            "no subscription for user {} and product {}",
                            subscription.user_id, subscription.product_id
                        ))
                    })?;

                delete(
                    subscriptions::table
                        .filter(
                            subscriptions::provider_subscription_id
                                .eq(&subscription.provider_subscription_id),
                        )
                        .filter(subscriptions::id.ne(owner.id)),
                )
                .execute(conn)?;

                let row = update(subscriptions::table.filter(subscriptions::id.eq(owner.id)))
                    .set((
                        subscriptions::customer_id.eq(subscription.customer_id),
                        subscriptions::provider_subscription_id
                            .eq(&subscription.provider_subscription_id),
                        subscriptions::price_id.eq(&subscription.price_id),
                        subscriptions::status.eq(subscription.status.to_string()),
                        subscriptions::current_period_start.eq(subscription.current_period_start),
                        subscriptions::current_period_end.eq(subscription.current_period_end),
                        subscriptions::updated_at.eq(owner.updated_at.max(now)),
                    ))
                    .returning(SubscriptionEntity::as_returning())
                    .get_result::<SubscriptionEntity>(conn)?;

                Ok(row)
            })
        })
        .await
    }
}
