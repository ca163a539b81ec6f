use thiserror::Error;

/// Named constraints shared by the Postgres schema and the in-memory store.
pub mod constraints {
    pub const CUSTOMERS_USER_ID: &str = "customers_user_id_key";
    pub const CUSTOMERS_PROVIDER_CUSTOMER_ID: &str = "customers_provider_customer_id_key";
    pub const SUBSCRIPTIONS_PROVIDER_SUBSCRIPTION_ID: &str =
        "subscriptions_provider_subscription_id_key";
    pub const SUBSCRIPTIONS_USER_PRODUCT: &str = "subscriptions_user_product_key";
    pub const SUBSCRIPTIONS_CUSTOMER_FK: &str = "subscriptions_customer_fk";
    pub const SUBSCRIPTIONS_PERIOD_CHECK: &str = "subscriptions_period_check";
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("uniqueness conflict on {constraint}: {message}")]
    Conflict { constraint: String, message: String },
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn conflict(constraint: &str, message: impl Into<String>) -> Self {
        StoreError::Conflict {
            constraint: constraint.to_string(),
            message: message.into(),
        }
    }

    /// The `(user_id, product_id)` conflict the reconciler resolves itself.
    pub fn is_user_product_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { constraint, .. }
                if constraint == constraints::SUBSCRIPTIONS_USER_PRODUCT
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("payment provider unavailable: {0}")]
    Transient(String),
    #[error("payment provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("webhook signature invalid: {0}")]
    InvalidSignature(String),
    #[error("unexpected provider payload: {0}")]
    Payload(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}
