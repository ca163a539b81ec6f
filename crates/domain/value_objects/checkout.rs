use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/checkout/subscription`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubscriptionCheckoutModel {
    pub user_id: String,
    pub email: String,
    pub product_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Body of `POST /api/v1/checkout/item`. Quantity defaults to 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ItemCheckoutModel {
    pub user_id: String,
    pub email: String,
    pub price_id: String,
    pub quantity: Option<i64>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CartItemModel {
    pub price_id: String,
    pub quantity: Option<i64>,
}

/// Body of `POST /api/v1/checkout/cart`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CartCheckoutModel {
    pub user_id: String,
    pub email: String,
    pub items: Vec<CartItemModel>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSessionDto {
    pub checkout_session_id: String,
    pub checkout_url: String,
}
