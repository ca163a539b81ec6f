use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::axum_http::error_responses::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The process-wide shared secret guarding `/api/v1/*`.
#[derive(Debug, Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(secret: &str) -> Self {
        Self(Arc::from(secret))
    }

    pub fn matches(&self, presented: &[u8]) -> bool {
        self.0.as_bytes() == presented
    }
}

pub async fn require_api_key(
    State(api_key): State<ApiKey>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .ok_or_else(|| AppError::Unauthorized {
            code: "MISSING_API_KEY",
            message: "X-API-Key header is required".to_string(),
        })?;

    if !api_key.matches(presented.as_bytes()) {
        tracing::warn!(path = %req.uri().path(), "auth: rejected api key");
        return Err(AppError::Unauthorized {
            code: "INVALID_API_KEY",
            message: "X-API-Key is not valid".to_string(),
        });
    }

    Ok(next.run(req).await)
}
