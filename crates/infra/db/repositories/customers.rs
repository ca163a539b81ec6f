use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, RunQueryDsl, insert_into, pg::Pg, prelude::*, query_builder::QueryFragment,
    query_dsl::LoadQuery, upsert::excluded,
};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::{PgPoolSquad, interact},
        schema::customers,
        sql_functions::greatest,
    },
};
use domain::{
    entities::customers::{CustomerEntity, InsertCustomerEntity},
    errors::StoreResult,
    repositories::customers::CustomerRepository,
};

pub struct CustomerPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CustomerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CustomerRepository for CustomerPostgres {
    async fn get_customer_by_user_id(&self, user_id: &str) -> StoreResult<Option<CustomerEntity>> {
        let user_id = user_id.to_string();

        interact(&self.db_pool, move |conn| {
            let customer = customers::table
                .filter(customers::user_id.eq(&user_id))
                .select(CustomerEntity::as_select())
                .first::<CustomerEntity>(conn)
                .optional()?;
            Ok(customer)
        })
        .await
    }

    async fn get_customer_by_provider_customer_id(
        &self,
        provider_customer_id: &str,
    ) -> StoreResult<Option<CustomerEntity>> {
        if provider_customer_id.is_empty() {
            return Ok(None);
        }
        let provider_customer_id = provider_customer_id.to_string();

        interact(&self.db_pool, move |conn| {
            let customer = customers::table
                .filter(customers::provider_customer_id.eq(&provider_customer_id))
                .select(CustomerEntity::as_select())
                .first::<CustomerEntity>(conn)
                .optional()?;
            Ok(customer)
        })
        .await
    }

    async fn upsert_customer(
        &self,
        user_id: &str,
        email: &str,
        provider_customer_id: &str,
    ) -> StoreResult<CustomerEntity> {
        let insert_entity =
            InsertCustomerEntity::new(user_id, email, provider_customer_id, Utc::now());

        interact(&self.db_pool, move |conn| {
            let customer = upsert_statement(&insert_entity).get_result::<CustomerEntity>(conn)?;
            Ok(customer)
        })
        .await
    }
}

fn upsert_statement<'a>(
    insert_entity: &'a InsertCustomerEntity,
) -> impl RunQueryDsl<PgConnection>
+ LoadQuery<'a, PgConnection, CustomerEntity>
+ QueryFragment<Pg>
+ 'a {
    insert_into(customers::table)
        .values(insert_entity)
        .on_conflict(customers::user_id)
        .do_update()
        .set((
            customers::email.eq(excluded(customers::email)),
            customers::provider_customer_id.eq(excluded(customers::provider_customer_id)),
            customers::updated_at.eq(greatest(customers::updated_at, excluded(customers::updated_at))),
        ))
        .returning(CustomerEntity::as_returning())
}
