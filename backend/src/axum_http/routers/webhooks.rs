use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use crates::domain::repositories::{
    customers::CustomerRepository, payment_gateway::PaymentGateway,
    subscriptions::SubscriptionRepository,
};
use serde::Serialize;

use crate::{axum_http::error_responses::AppError, usecases::subscriptions::SubscriptionUseCase};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAckDto {
    pub received: bool,
    pub outcome: &'static str,
}

pub fn routes<C, S, G>(subscriptions_usecase: Arc<SubscriptionUseCase<C, S, G>>) -> Router
where
    C: CustomerRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/webhooks/stripe", post(stripe::<C, S, G>))
        .with_state(subscriptions_usecase)
}

pub async fn stripe<C, S, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<C, S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckDto>, AppError>
where
    C: CustomerRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::BadSignature {
            code: "MISSING_SIGNATURE",
            message: "Stripe-Signature header is required".to_string(),
        })?;

    let event = subscriptions_usecase.verify_event(&body, signature)?;
    let outcome = subscriptions_usecase.handle_event(event).await?;

    Ok(Json(WebhookAckDto {
        received: true,
        outcome: outcome.as_str(),
    }))
}
