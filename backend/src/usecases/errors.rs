use std::{future::Future, time::Duration};

use crates::domain::errors::{GatewayError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UseCaseError {
    #[error("{message}")]
    Validation {
        field: String,
        code: &'static str,
        message: String,
    },
    #[error("no payment customer for user {0}")]
    CustomerNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("deadline exceeded while {0}")]
    Timeout(&'static str),
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

impl UseCaseError {
    pub fn validation(field: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        UseCaseError::Validation {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, UseCaseError>;

/// Runs `work` under `deadline`; expiry abandons the in-flight calls.
pub async fn with_deadline<T, F>(deadline: Duration, operation: &'static str, work: F) -> UseCaseResult<T>
where
    F: Future<Output = UseCaseResult<T>>,
{
    match tokio::time::timeout(deadline, work).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(operation, deadline_ms = deadline.as_millis() as u64, "deadline exceeded");
            Err(UseCaseError::Timeout(operation))
        }
    }
}
