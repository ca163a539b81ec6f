use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use chrono::Utc;
use serde::Serialize;

use super::error_responses::AppError;

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub timestamp: String,
    pub service: String,
}

pub fn routes(service_name: String) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(Arc::new(service_name))
}

pub async fn health_check(State(service_name): State<Arc<String>>) -> impl IntoResponse {
    Json(HealthDto {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        service: service_name.as_ref().clone(),
    })
}

pub async fn not_found() -> AppError {
    AppError::NotFound {
        code: "ROUTE_NOT_FOUND",
        message: "no route matches this path".to_string(),
    }
}
