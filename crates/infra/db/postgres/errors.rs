use diesel::{
    r2d2::PoolError,
    result::{DatabaseErrorKind, Error as DieselError},
};

use crate::domain::errors::StoreError;

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => StoreError::NotFound("row not found".to_string()),
            DieselError::DatabaseError(kind, info) => {
                let constraint = info.constraint_name().unwrap_or_default().to_string();
                let message = info.message().to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => {
                        StoreError::Conflict { constraint, message }
                    }
                    DatabaseErrorKind::SerializationFailure
                    | DatabaseErrorKind::ClosedConnection => StoreError::Transient(message),
                    _ if constraint.is_empty() => StoreError::Fatal(message),
                    _ => StoreError::Fatal(format!("{message} (constraint {constraint})")),
                }
            }
            DieselError::BrokenTransactionManager => {
                StoreError::Transient("broken transaction manager".to_string())
            }
            other => StoreError::Fatal(other.to_string()),
        }
    }
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        StoreError::Transient(format!("connection pool: {err}"))
    }
}
