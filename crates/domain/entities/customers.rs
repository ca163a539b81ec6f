use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::customers;

#[derive(Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = customers)]
pub struct CustomerEntity {
    pub id: Uuid,
    pub user_id: String,
    pub email: String,
    pub provider_customer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerEntity {
    /// True once the provider customer id is known. A resolve attempt whose
    /// provider call failed leaves it empty.
    pub fn has_provider_customer(&self) -> bool {
        !self.provider_customer_id.is_empty()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = customers)]
pub struct InsertCustomerEntity {
    pub id: Uuid,
    pub user_id: String,
    pub email: String,
    pub provider_customer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsertCustomerEntity {
    pub fn new(user_id: &str, email: &str, provider_customer_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            provider_customer_id: provider_customer_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
