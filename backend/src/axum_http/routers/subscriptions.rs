use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use crates::domain::{
    repositories::{
        customers::CustomerRepository, payment_gateway::PaymentGateway,
        subscriptions::SubscriptionRepository,
    },
    value_objects::subscriptions::SubscriptionStatusDto,
};

use crate::{axum_http::error_responses::AppError, usecases::subscriptions::SubscriptionUseCase};

pub fn routes<C, S, G>(subscriptions_usecase: Arc<SubscriptionUseCase<C, S, G>>) -> Router
where
    C: CustomerRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/subscriptions/:user_id/:product_id", get(get_status::<C, S, G>))
        .with_state(subscriptions_usecase)
}

pub async fn get_status<C, S, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<C, S, G>>>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<Json<SubscriptionStatusDto>, AppError>
where
    C: CustomerRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Ok(Json(subscriptions_usecase.get_status(&user_id, &product_id).await?))
}
