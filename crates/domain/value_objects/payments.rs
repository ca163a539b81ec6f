use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::checkout_modes::CheckoutMode;

pub const METADATA_USER_ID: &str = "user_id";
pub const METADATA_PRODUCT_ID: &str = "product_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub price_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub mode: CheckoutMode,
    pub customer_id: String,
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalSession {
    pub url: String,
}

/// Provider-side snapshot of one subscription. `status` is kept verbatim so
/// the reconciler decides what an unrecognised value means.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub price_id: Option<String>,
    pub product_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderCheckoutSession {
    pub id: String,
    pub mode: Option<CheckoutMode>,
    pub payment_status: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderInvoice {
    pub id: String,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEventObject {
    CheckoutSession(ProviderCheckoutSession),
    Subscription(ProviderSubscription),
    Invoice(ProviderInvoice),
    Other,
}

/// A webhook event whose signature has already been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub id: String,
    pub event_type: String,
    pub created: Option<i64>,
    pub object: ProviderEventObject,
}
