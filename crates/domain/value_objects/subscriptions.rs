use serde::{Deserialize, Serialize};

use crate::domain::entities::subscriptions::SubscriptionEntity;

pub const STATUS_NONE: &str = "none";

/// Answer to `GET /api/v1/subscriptions/{user_id}/{product_id}`.
/// `current_period_end` is unix seconds, 0 when unknown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionStatusDto {
    pub status: String,
    pub subscription_id: String,
    pub current_period_end: i64,
    pub product_id: String,
    pub entitled: bool,
}

impl SubscriptionStatusDto {
    pub fn none() -> Self {
        Self {
            status: STATUS_NONE.to_string(),
            subscription_id: String::new(),
            current_period_end: 0,
            product_id: String::new(),
            entitled: false,
        }
    }
}

impl From<SubscriptionEntity> for SubscriptionStatusDto {
    fn from(value: SubscriptionEntity) -> Self {
        let entitled = value
            .status()
            .map(|status| status.is_entitled())
            .unwrap_or(false);

        Self {
            entitled,
            current_period_end: value
                .current_period_end
                .map(|end| end.timestamp())
                .unwrap_or(0),
            status: value.status,
            subscription_id: value.provider_subscription_id,
            product_id: value.product_id,
        }
    }
}
