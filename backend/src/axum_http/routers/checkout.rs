use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use crates::domain::{
    repositories::{customers::CustomerRepository, payment_gateway::PaymentGateway},
    value_objects::checkout::{
        CartCheckoutModel, CheckoutSessionDto, ItemCheckoutModel, SubscriptionCheckoutModel,
    },
};

use crate::{
    axum_http::error_responses::{ApiJson, AppError},
    usecases::checkout::CheckoutUseCase,
};

pub fn routes<C, G>(checkout_usecase: Arc<CheckoutUseCase<C, G>>) -> Router
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/checkout/subscription", post(subscription::<C, G>))
        .route("/checkout/item", post(item::<C, G>))
        .route("/checkout/cart", post(cart::<C, G>))
        .with_state(checkout_usecase)
}

pub async fn subscription<C, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<C, G>>>,
    ApiJson(model): ApiJson<SubscriptionCheckoutModel>,
) -> Result<Json<CheckoutSessionDto>, AppError>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Ok(Json(checkout_usecase.subscription(model).await?))
}

pub async fn item<C, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<C, G>>>,
    ApiJson(model): ApiJson<ItemCheckoutModel>,
) -> Result<Json<CheckoutSessionDto>, AppError>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Ok(Json(checkout_usecase.item(model).await?))
}

pub async fn cart<C, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<C, G>>>,
    ApiJson(model): ApiJson<CartCheckoutModel>,
) -> Result<Json<CheckoutSessionDto>, AppError>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Ok(Json(checkout_usecase.cart(model).await?))
}
