use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    errors::GatewayResult,
    value_objects::payments::{
        CheckoutSession, CheckoutSessionRequest, PortalSession, ProviderEvent,
        ProviderSubscription,
    },
};

/// Hosted payment provider. Implementations never touch the store.
#[automock]
#[async_trait]
pub trait PaymentGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> GatewayResult<CheckoutSession>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> GatewayResult<PortalSession>;

    async fn fetch_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> GatewayResult<ProviderSubscription>;

    fn verify_webhook(&self, payload: &[u8], signature_header: &str)
    -> GatewayResult<ProviderEvent>;

    async fn create_customer(
        &self,
        email: &str,
        metadata: HashMap<String, String>,
    ) -> GatewayResult<String>;
}
