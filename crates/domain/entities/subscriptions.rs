use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
use crate::infra::db::postgres::schema::subscriptions;

#[derive(Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub price_id: String,
    pub provider_subscription_id: String,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    pub fn status(&self) -> Option<SubscriptionStatus> {
        self.status.parse().ok()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub price_id: String,
    pub provider_subscription_id: String,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The reconciler's view of one mirrored subscription, before the store
/// assigns ids and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertSubscriptionEntity {
    pub customer_id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub price_id: String,
    pub provider_subscription_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl UpsertSubscriptionEntity {
    pub fn into_insert(self, now: DateTime<Utc>) -> InsertSubscriptionEntity {
        InsertSubscriptionEntity {
            id: Uuid::new_v4(),
            customer_id: self.customer_id,
            user_id: self.user_id,
            product_id: self.product_id,
            price_id: self.price_id,
            provider_subscription_id: self.provider_subscription_id,
            status: self.status.to_string(),
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
            created_at: now,
            updated_at: now,
        }
    }
}
