use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use crates::domain::{
    repositories::{customers::CustomerRepository, payment_gateway::PaymentGateway},
    value_objects::portal::{PortalModel, PortalSessionDto},
};

use crate::{
    axum_http::error_responses::{ApiJson, AppError},
    usecases::portal::PortalUseCase,
};

pub fn routes<C, G>(portal_usecase: Arc<PortalUseCase<C, G>>) -> Router
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/portal", post(create_portal::<C, G>))
        .with_state(portal_usecase)
}

pub async fn create_portal<C, G>(
    State(portal_usecase): State<Arc<PortalUseCase<C, G>>>,
    ApiJson(model): ApiJson<PortalModel>,
) -> Result<Json<PortalSessionDto>, AppError>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Ok(Json(portal_usecase.create_portal(model).await?))
}
