use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use crates::domain::errors::{GatewayError, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use super::request_context::current_request_id;
use crate::usecases::errors::UseCaseError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorMeta {
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub meta: ErrorMeta,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        field: Option<String>,
        code: String,
        message: String,
    },
    #[error("{message}")]
    Unauthorized { code: &'static str, message: String },
    /// Webhook signature problems: authentication failures reported as 400.
    #[error("{message}")]
    BadSignature { code: &'static str, message: String },
    #[error("{message}")]
    NotFound { code: &'static str, message: String },
    #[error(transparent)]
    UseCase(#[from] UseCaseError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation {
            field: None,
            code: "INVALID_JSON".to_string(),
            message: rejection.body_text(),
        }
    }
}

/// `axum::Json` whose rejection renders the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

struct Rendered {
    status: StatusCode,
    body: ErrorBody,
}

fn rendered(
    status: StatusCode,
    kind: &'static str,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Rendered {
    Rendered {
        status,
        body: ErrorBody {
            kind,
            code: code.into(),
            message: message.into(),
            description: None,
            field: None,
        },
    }
}

impl AppError {
    fn render(self) -> Rendered {
        match self {
            AppError::Validation {
                field,
                code,
                message,
            } => {
                let mut out = rendered(StatusCode::BAD_REQUEST, "validation_error", code, message);
                out.body.field = field;
                out
            }
            AppError::Unauthorized { code, message } => {
                rendered(StatusCode::UNAUTHORIZED, "auth_error", code, message)
            }
            AppError::BadSignature { code, message } => {
                rendered(StatusCode::BAD_REQUEST, "auth_error", code, message)
            }
            AppError::NotFound { code, message } => {
                rendered(StatusCode::NOT_FOUND, "not_found", code, message)
            }
            AppError::UseCase(err) => render_use_case(err),
        }
    }
}

fn render_use_case(err: UseCaseError) -> Rendered {
    match err {
        UseCaseError::Validation {
            field,
            code,
            message,
        } => {
            let mut out = rendered(StatusCode::BAD_REQUEST, "validation_error", code, message);
            out.body.field = Some(field);
            out
        }
        UseCaseError::CustomerNotFound(user_id) => rendered(
            StatusCode::NOT_FOUND,
            "not_found",
            "CUSTOMER_NOT_FOUND",
            format!("no payment customer exists for user {user_id}"),
        ),
        UseCaseError::InvalidPayload(detail) => {
            warn!(detail = %detail, "http: rejecting invalid event payload");
            let mut out = rendered(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "INVALID_PAYLOAD",
                "event payload could not be applied",
            );
            out.body.description = Some(detail);
            out
        }
        UseCaseError::Timeout(operation) => rendered(
            StatusCode::SERVICE_UNAVAILABLE,
            "transient_error",
            "TIMEOUT",
            format!("deadline exceeded while {operation}"),
        ),
        UseCaseError::Store(StoreError::Conflict { constraint, .. }) => {
            let mut out = rendered(StatusCode::CONFLICT, "conflict", "CONFLICT", "resource already exists");
            out.body.description = Some(constraint);
            out
        }
        UseCaseError::Store(StoreError::Transient(_)) | UseCaseError::Gateway(GatewayError::Transient(_)) => {
            rendered(
                StatusCode::SERVICE_UNAVAILABLE,
                "transient_error",
                "SERVICE_UNAVAILABLE",
                "a dependency is temporarily unavailable, retry later",
            )
        }
        UseCaseError::Gateway(GatewayError::Provider { message, .. }) => {
            let mut out = rendered(
                StatusCode::BAD_GATEWAY,
                "provider_error",
                "PROVIDER_ERROR",
                "payment provider rejected the request",
            );
            out.body.description = Some(message);
            out
        }
        UseCaseError::Gateway(GatewayError::InvalidSignature(_)) => rendered(
            StatusCode::BAD_REQUEST,
            "auth_error",
            "INVALID_SIGNATURE",
            "webhook signature verification failed",
        ),
        UseCaseError::Gateway(GatewayError::Payload(_)) => rendered(
            StatusCode::BAD_GATEWAY,
            "provider_error",
            "PROVIDER_ERROR",
            "payment provider returned an unexpected response",
        ),
        UseCaseError::Store(StoreError::Fatal(_) | StoreError::NotFound(_)) => rendered(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "INTERNAL_ERROR",
            "internal server error",
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        let Rendered { status, body } = self.render();

        if status.is_server_error() {
            error!(status = %status, code = %body.code, error = %detail, "http: request failed");
        }

        let envelope = ErrorResponse {
            error: body,
            meta: ErrorMeta {
                request_id: current_request_id(),
                timestamp: Utc::now().to_rfc3339(),
            },
        };

        (status, Json(envelope)).into_response()
    }
}
